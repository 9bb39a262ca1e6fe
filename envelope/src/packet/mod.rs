//! PGP packet framing.
//!
//! This module contains the codec for PGP's packet headers: the old
//! (PGP 2) and new (OpenPGP) CTB formats, their length encodings
//! including partial body lengths, and PGP's multiprecision integer
//! framing.  See [Section 4.2 of RFC 4880].
//!
//!   [Section 4.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2

mod tag;
pub use self::tag::Tag;
pub mod header;
pub use self::header::{
    Header,
    MAX_OBJECT_LENGTH,
    packet_size,
    read_object_header,
    read_packet_header,
    read_partial_length,
    read_short_length,
    write_old_packet_header,
    write_packet_header,
};
pub mod mpi;

/// The size of the largest packet header: a CTB and a five byte
/// length.
pub const MAX_HEADER_SIZE: usize = 6;

/// The size of an MDC packet: header plus SHA-1 digest.
pub const MDC_PACKET_SIZE: usize = 22;

/// The two fixed bytes that start an MDC packet.
pub const MDC_PACKET_HEADER: [u8; 2] = [0xD3, 0x14];

/// The size of a PGP key ID.
pub const KEYID_SIZE: usize = 8;

/// The size of an S2K salt.
pub const SALT_SIZE: usize = 8;

/// A packet's body length.
///
/// The encoding of the body length is described in [Section 4.2.2 of
/// RFC 4880] and, for old-format packets, in [Section 4.2.1].
///
///   [Section 4.2.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2.2
///   [Section 4.2.1]: https://tools.ietf.org/html/rfc4880#section-4.2.1
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BodyLength {
    /// The packet's size is known.
    Full(u32),
    /// The parameter is the number of bytes in the current chunk.
    ///
    /// This type is only used with new format packets.
    Partial(u32),
    /// The packet extends until an EOF is encountered.
    ///
    /// This type is only used with old format packets.
    Indeterminate,
}

impl BodyLength {
    /// Returns whether the length is known up front.
    pub fn is_definite(&self) -> bool {
        matches!(self, BodyLength::Full(_))
    }
}
