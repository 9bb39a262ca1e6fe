use std::fmt;

#[cfg(test)]
use quickcheck::{Arbitrary, Gen};

/// The PGP packet tags the de-enveloper deals with.
///
/// The values correspond to the serialized format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Public-Key Encrypted Session Key Packet.
    PKE,
    Signature,
    /// Symmetric-Key Encrypted Session Key Packet.
    SKE,
    /// One-Pass Signature Packet.
    OnePassSig,
    CompressedData,
    /// Symmetrically Encrypted Data Packet.
    Encrypted,
    Marker,
    Literal,
    /// Sym. Encrypted and Integrity Protected Data Packet.
    EncryptedMDC,
    /// Modification Detection Code Packet.
    MDC,
    /// Any other packet type.
    Unknown(u8),
}

impl From<u8> for Tag {
    fn from(u: u8) -> Self {
        use self::Tag::*;

        match u {
            1 => PKE,
            2 => Signature,
            3 => SKE,
            4 => OnePassSig,
            8 => CompressedData,
            9 => Encrypted,
            10 => Marker,
            11 => Literal,
            18 => EncryptedMDC,
            19 => MDC,
            u => Unknown(u),
        }
    }
}

impl From<Tag> for u8 {
    fn from(t: Tag) -> u8 {
        match t {
            Tag::PKE => 1,
            Tag::Signature => 2,
            Tag::SKE => 3,
            Tag::OnePassSig => 4,
            Tag::CompressedData => 8,
            Tag::Encrypted => 9,
            Tag::Marker => 10,
            Tag::Literal => 11,
            Tag::EncryptedMDC => 18,
            Tag::MDC => 19,
            Tag::Unknown(u) => u,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Tag::PKE =>
                f.write_str("Public-Key Encrypted Session Key Packet"),
            Tag::Signature => f.write_str("Signature Packet"),
            Tag::SKE =>
                f.write_str("Symmetric-Key Encrypted Session Key Packet"),
            Tag::OnePassSig => f.write_str("One-Pass Signature Packet"),
            Tag::CompressedData => f.write_str("Compressed Data Packet"),
            Tag::Encrypted =>
                f.write_str("Symmetrically Encrypted Data Packet"),
            Tag::Marker => f.write_str("Marker Packet"),
            Tag::Literal => f.write_str("Literal Data Packet"),
            Tag::EncryptedMDC =>
                f.write_str("Sym. Encrypted and Integrity Protected Data Packet"),
            Tag::MDC => f.write_str("Modification Detection Code Packet"),
            Tag::Unknown(u) =>
                f.write_fmt(format_args!("Unknown Packet {}", u)),
        }
    }
}

#[cfg(test)]
impl Arbitrary for Tag {
    fn arbitrary(g: &mut Gen) -> Self {
        (u8::arbitrary(g) & 0x3F).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    quickcheck! {
        fn roundtrip(tag: Tag) -> bool {
            let val: u8 = tag.into();
            tag == Tag::from(val)
        }
    }

    #[test]
    fn known() {
        assert_eq!(Tag::from(18), Tag::EncryptedMDC);
        assert_eq!(Tag::from(5), Tag::Unknown(5));
        assert!(format!("{}", Tag::Unknown(5)).contains('5'));
    }
}
