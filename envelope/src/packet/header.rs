//! Packet headers and body lengths.

use std::io;

use crate::{
    Error,
    Result,
};
use crate::packet::{BodyLength, Tag};
use crate::serialize::{write_be_u16, write_be_u32, write_byte, Serialize};
use crate::stream::Stream;

/// A PGP packet's header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    tag: Tag,
    new_format: bool,
    length: BodyLength,
    header_len: usize,
}

impl Header {
    /// Returns the packet's tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Returns whether the header uses the new (OpenPGP) format.
    pub fn is_new_format(&self) -> bool {
        self.new_format
    }

    /// Returns the PGP version implied by the CTB format.
    ///
    /// Old-format CTBs are PGP 2, new-format CTBs OpenPGP.
    pub fn version(&self) -> u8 {
        if self.new_format { 4 } else { 2 }
    }

    /// Returns the packet's length.
    pub fn length(&self) -> &BodyLength {
        &self.length
    }

    /// Returns the number of bytes the header occupied.
    pub fn header_len(&self) -> usize {
        self.header_len
    }
}

/// Reads a body length in the encoding selected by `ctb`.
///
/// New-format CTBs use the variable 1/2/5 byte encoding, which may
/// also yield a partial body length; old-format CTBs take the length
/// size from their two low bits.
pub fn read_short_length(s: &mut Stream, ctb: u8) -> Result<BodyLength> {
    if ctb & 0x40 != 0 {
        return read_partial_length(s);
    }

    match ctb & 0x03 {
        0 => Ok(BodyLength::Full(s.read_u8()? as u32)),
        1 => Ok(BodyLength::Full(s.read_be_u16()? as u32)),
        2 => Ok(BodyLength::Full(s.read_be_u32()?)),
        _ => Ok(BodyLength::Indeterminate),
    }
}

/// Decodes a new format body length as described in [Section 4.2.2
/// of RFC 4880].
///
/// Within a partial body, the caller loops over this until a
/// `BodyLength::Full` terminator chunk is read.
///
///   [Section 4.2.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-4.2.2
pub fn read_partial_length(s: &mut Stream) -> Result<BodyLength> {
    let mut t = s.clone();
    let octet1 = t.read_u8()?;
    let l = match octet1 {
        0..=191 => // One octet.
            BodyLength::Full(octet1 as u32),
        192..=223 => { // Two octets length.
            let octet2 = t.read_u8()?;
            BodyLength::Full(((octet1 as u32 - 192) << 8)
                             + octet2 as u32 + 192)
        },
        224..=254 => // Partial body length.
            BodyLength::Partial(1 << (octet1 & 0x1F)),
        255 => // Five octets.
            BodyLength::Full(t.read_be_u32()?),
    };
    *s = t;
    Ok(l)
}

/// Reads a packet header.
///
/// Definite lengths outside `min_length..=max_length` are rejected.
/// Partial and indeterminate lengths are only accepted if
/// `allow_indefinite` is set.  On error the stream is left where it
/// was.
pub fn read_packet_header(s: &mut Stream, min_length: usize,
                          max_length: usize, allow_indefinite: bool)
                          -> Result<Header>
{
    let mut t = s.clone();
    let start = t.tell();
    let ctb = t.read_u8()?;
    if ctb & 0x80 == 0 {
        return Err(Error::BadData(
            format!("Invalid CTB {:#04x}", ctb)).into());
    }
    let new_format = ctb & 0x40 != 0;
    let tag = if new_format {
        Tag::from(ctb & 0x3F)
    } else {
        Tag::from((ctb >> 2) & 0x0F)
    };
    let length = read_short_length(&mut t, ctb)?;

    match length {
        BodyLength::Full(l) => {
            let l = l as usize;
            if l < min_length || l > max_length {
                return Err(Error::BadData(
                    format!("{} length {} outside {}..={}",
                            tag, l, min_length, max_length)).into());
            }
        }
        BodyLength::Partial(_) | BodyLength::Indeterminate => {
            if ! allow_indefinite {
                return Err(Error::BadData(
                    format!("Indefinite length not allowed for {}", tag))
                           .into());
            }
        }
    }

    let header_len = t.tell() - start;
    *s = t;
    Ok(Header { tag, new_format, length, header_len })
}

/// The largest definite length accepted for a packet that is parsed
/// as a whole, such as a signature or an encrypted session key.
pub const MAX_OBJECT_LENGTH: usize = 16384;

/// Reads the header of a packet that has to be of type `tag`.
///
/// Such packets are parsed as a whole, so they need a definite
/// length of at least `min_length` bytes.
pub fn read_object_header(s: &mut Stream, tag: Tag, min_length: usize)
                          -> Result<Header>
{
    let mut t = s.clone();
    let header = read_packet_header(&mut t, min_length, MAX_OBJECT_LENGTH,
                                    false)?;
    if header.tag() != tag {
        return Err(Error::BadData(
            format!("Expected a {}, got a {}", tag, header.tag())).into());
    }
    *s = t;
    Ok(header)
}

/// Returns the total size of the packet at the start of `data`.
///
/// The header must have a definite length.
pub fn packet_size(data: &[u8]) -> Result<usize> {
    let mut s = Stream::new(data);
    let header = read_packet_header(&mut s, 0, MAX_OBJECT_LENGTH, false)?;
    match header.length() {
        BodyLength::Full(l) => Ok(header.header_len() + *l as usize),
        _ => Err(Error::Internal("Indefinite length".into()).into()),
    }
}

/// Writes a new-format packet header.
///
/// The shortest encoding of `length` is selected.
pub fn write_packet_header<W: io::Write + ?Sized>(o: &mut W, tag: Tag,
                                                  length: BodyLength)
                                                  -> Result<()>
{
    let tag: u8 = tag.into();
    if tag > 0x3F {
        return Err(Error::InvalidArgument(
            format!("Tag {} doesn't fit a CTB", tag)).into());
    }
    write_byte(o, 0xC0 | tag)?;
    length.serialize(o)
}

/// Writes an old-format (PGP 2) packet header.
pub fn write_old_packet_header<W: io::Write + ?Sized>(o: &mut W, tag: Tag,
                                                      length: BodyLength)
                                                      -> Result<()>
{
    let tag: u8 = tag.into();
    if tag > 0x0F {
        return Err(Error::InvalidArgument(
            format!("Tag {} doesn't fit an old-format CTB", tag)).into());
    }
    let ctb = 0x80 | (tag << 2);
    match length {
        BodyLength::Full(l) if l <= 0xFF => {
            write_byte(o, ctb)?;
            write_byte(o, l as u8)?;
        }
        BodyLength::Full(l) if l <= 0xFFFF => {
            write_byte(o, ctb | 1)?;
            write_be_u16(o, l as u16)?;
        }
        BodyLength::Full(l) => {
            write_byte(o, ctb | 2)?;
            write_be_u32(o, l)?;
        }
        BodyLength::Indeterminate => write_byte(o, ctb | 3)?,
        BodyLength::Partial(_) =>
            return Err(Error::InvalidArgument(
                "Partial body lengths need a new-format CTB".into()).into()),
    }
    Ok(())
}

impl Serialize for BodyLength {
    /// Emits the length encoded for use with new-style CTBs.
    ///
    /// Note: the CTB itself is not emitted.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if invoked on
    /// `BodyLength::Indeterminate`, or on a partial length that isn't
    /// a power of two up to 2^30.
    fn serialize<W: io::Write + ?Sized>(&self, o: &mut W) -> Result<()> {
        match *self {
            BodyLength::Full(l) => {
                if l <= 191 {
                    write_byte(o, l as u8)?;
                } else if l <= 8383 {
                    let v = l - 192;
                    write_byte(o, (v >> 8) as u8 + 192)?;
                    write_byte(o, (v & 0xFF) as u8)?;
                } else {
                    write_byte(o, 0xFF)?;
                    write_be_u32(o, l)?;
                }
            }
            BodyLength::Partial(l) => {
                if ! l.is_power_of_two() || l > 1 << 30 {
                    return Err(Error::InvalidArgument(
                        format!("Partial length must be a power of two \
                                 up to 2^30 (got: {})", l)).into());
                }
                write_byte(o, 224 + l.trailing_zeros() as u8)?;
            }
            BodyLength::Indeterminate =>
                return Err(Error::InvalidArgument(
                    "Indeterminate lengths can only be used with \
                     old-format CTBs".into()).into()),
        }
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        match *self {
            BodyLength::Full(l) if l <= 191 => 1,
            BodyLength::Full(l) if l <= 8383 => 2,
            BodyLength::Full(_) => 5,
            BodyLength::Partial(_) => 1,
            BodyLength::Indeterminate => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(e: &anyhow::Error) -> Option<&Error> {
        e.downcast_ref::<Error>()
    }

    #[test]
    fn body_length_new_format() {
        fn test(input: &[u8], expected_result: BodyLength) {
            let mut s = Stream::new(input);
            assert_eq!(read_partial_length(&mut s).unwrap(), expected_result);
            assert_eq!(s.remaining(), 0);
        }

        // Examples from Section 4.2.3 of RFC4880.

        // Example #1.
        test(&[0x64][..], BodyLength::Full(100));

        // Example #2.
        test(&[0xC5, 0xFB][..], BodyLength::Full(1723));

        // Example #3.
        test(&[0xFF, 0x00, 0x01, 0x86, 0xA0][..], BodyLength::Full(100000));

        // Example #4.
        test(&[0xEF][..], BodyLength::Partial(32768));
        test(&[0xE1][..], BodyLength::Partial(2));
        test(&[0xF0][..], BodyLength::Partial(65536));
        test(&[0xC5, 0xDD][..], BodyLength::Full(1693));
    }

    #[test]
    fn body_length_old_format() {
        fn test(input: &[u8], ctb: u8, expected_result: BodyLength,
                expected_rest: &[u8]) {
            let mut s = Stream::new(input);
            assert_eq!(read_short_length(&mut s, ctb).unwrap(),
                       expected_result);
            assert_eq!(s.rest(), expected_rest);
        }

        test(&[1], 0xAC, BodyLength::Full(1), &b""[..]);
        test(&[1, 2], 0xAD, BodyLength::Full((1 << 8) + 2), &b""[..]);
        test(&[1, 2, 3, 4], 0xAE,
             BodyLength::Full((1 << 24) + (2 << 16) + (3 << 8) + 4), &b""[..]);
        test(&[1, 2, 3, 4, 5, 6], 0xAE,
             BodyLength::Full((1 << 24) + (2 << 16) + (3 << 8) + 4),
             &[5, 6][..]);
        test(&[1, 2, 3, 4], 0xAF, BodyLength::Indeterminate,
             &[1, 2, 3, 4][..]);
    }

    #[test]
    fn boundaries() {
        for &l in &[0u32, 1, 191, 192, 193, 8383, 8384, u32::MAX] {
            let len = BodyLength::Full(l);
            let mut buf = Vec::new();
            write_packet_header(&mut buf, Tag::Literal, len).unwrap();
            assert_eq!(buf.len(), 1 + len.serialized_len());

            let mut s = Stream::new(&buf);
            let h = read_packet_header(&mut s, 0, usize::MAX, false).unwrap();
            assert_eq!(h.tag(), Tag::Literal);
            assert_eq!(h.length(), &len);
            assert_eq!(h.header_len(), buf.len());
            assert!(h.is_new_format());

            // Every proper prefix is an underflow, and leaves the
            // stream untouched.
            for i in 0..buf.len() {
                let mut s = Stream::new(&buf[..i]);
                let e = read_packet_header(&mut s, 0, usize::MAX, false)
                    .unwrap_err();
                assert_eq!(kind(&e), Some(&Error::Underflow), "{} {}", l, i);
                assert_eq!(s.tell(), 0);
            }
        }
    }

    #[test]
    fn encoding_sizes() {
        assert_eq!(BodyLength::Full(191).to_vec().unwrap(), vec![191]);
        assert_eq!(BodyLength::Full(192).to_vec().unwrap(), vec![192, 0]);
        assert_eq!(BodyLength::Full(8383).to_vec().unwrap(), vec![223, 255]);
        assert_eq!(BodyLength::Full(8384).to_vec().unwrap(),
                   vec![255, 0, 0, 0x20, 0xC0]);
        assert_eq!(BodyLength::Partial(512).to_vec().unwrap(), vec![233]);
        assert!(BodyLength::Partial(513).to_vec().is_err());
        assert!(BodyLength::Indeterminate.to_vec().is_err());
    }

    #[test]
    fn old_format_headers() {
        for &(l, size) in &[(BodyLength::Full(10), 2),
                            (BodyLength::Full(300), 3),
                            (BodyLength::Full(70000), 5),
                            (BodyLength::Indeterminate, 1)] {
            let mut buf = Vec::new();
            write_old_packet_header(&mut buf, Tag::CompressedData, l).unwrap();
            assert_eq!(buf.len(), size);
            let mut s = Stream::new(&buf);
            let h = read_packet_header(&mut s, 0, usize::MAX, true).unwrap();
            assert_eq!(h.tag(), Tag::CompressedData);
            assert_eq!(h.length(), &l);
            assert_eq!(h.version(), 2);
        }
        assert!(write_old_packet_header(&mut Vec::new(), Tag::EncryptedMDC,
                                        BodyLength::Full(1)).is_err());
    }

    #[test]
    fn limits() {
        // Literal, 5 bytes.
        let buf = [0xCB, 0x05];
        let mut s = Stream::new(&buf);
        let e = read_packet_header(&mut s, 6, 100, false).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
        let e = read_packet_header(&mut s, 0, 4, false).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
        assert!(read_packet_header(&mut s, 5, 5, false).is_ok());

        // Partial lengths need permission.
        let buf = [0xCB, 0xE9];
        let mut s = Stream::new(&buf);
        assert!(read_packet_header(&mut s, 0, 100, false).is_err());
        let h = read_packet_header(&mut s, 0, 100, true).unwrap();
        assert_eq!(h.length(), &BodyLength::Partial(512));

        // Not a CTB.
        let buf = [0x4B, 0x05];
        let e = read_packet_header(&mut Stream::new(&buf), 0, 100, false)
            .unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
    }

    #[test]
    fn object_headers() {
        let mut buf = Vec::new();
        write_packet_header(&mut buf, Tag::SKE, BodyLength::Full(4)).unwrap();
        buf.extend_from_slice(&[4, 3, 0, 2]);
        assert_eq!(packet_size(&buf).unwrap(), 6);

        let mut s = Stream::new(&buf);
        assert!(read_object_header(&mut s, Tag::PKE, 0).is_err());
        assert!(read_object_header(&mut s, Tag::SKE, 5).is_err());
        assert_eq!(s.tell(), 0);
        let h = read_object_header(&mut s, Tag::SKE, 4).unwrap();
        assert_eq!(h.header_len(), 2);
        assert_eq!(s.rest(), &[4, 3, 0, 2]);
    }

    quickcheck! {
        fn full_length_roundtrip(l: u32) -> bool {
            let buf = BodyLength::Full(l).to_vec().unwrap();
            let mut s = Stream::new(&buf);
            read_partial_length(&mut s).unwrap() == BodyLength::Full(l)
                && s.remaining() == 0
        }
    }

    #[quickcheck_macros::quickcheck]
    fn garbage_headers(data: Vec<u8>) -> bool {
        let mut s = Stream::new(&data);
        match read_packet_header(&mut s, 0, usize::MAX, true) {
            Ok(h) => s.tell() == h.header_len(),
            Err(_) => true,
        }
    }
}
