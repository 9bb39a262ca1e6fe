//! Minimal DER reading.
//!
//! The readers here keep the stream position meaningful so callers
//! can record `(start, length)` spans of sub-structures.  Writing goes
//! through `yasna`.

use crate::Error;
use crate::Result;
use crate::stream::Stream;

pub(crate) const BER_INTEGER: u8 = 0x02;
pub(crate) const BER_BITSTRING: u8 = 0x03;
pub(crate) const BER_OCTETSTRING: u8 = 0x04;
pub(crate) const BER_NULL: u8 = 0x05;
pub(crate) const BER_OBJECT_IDENTIFIER: u8 = 0x06;
pub(crate) const BER_SEQUENCE: u8 = 0x30;
pub(crate) const BER_SET: u8 = 0x31;

/// Largest length we accept for any DER object.
const MAX_DER_LENGTH: usize = 0x7FFF_FFFF;

/// Returns the tag of a constructed context-specific object.
pub(crate) const fn ctag(n: u8) -> u8 {
    0xA0 | n
}

/// Returns the tag of a primitive context-specific object.
pub(crate) const fn ptag(n: u8) -> u8 {
    0x80 | n
}

pub(crate) fn peek_tag(s: &Stream) -> Result<u8> {
    s.peek_u8()
}

fn read_length(s: &mut Stream) -> Result<usize> {
    let b = s.read_u8()?;
    if b & 0x80 == 0 {
        return Ok(b as usize);
    }
    let n = (b & 0x7F) as usize;
    if n == 0 {
        return Err(Error::BadData(
            "Indefinite-length encoding in DER data".into()).into());
    }
    if n > 4 {
        return Err(Error::BadData(
            format!("DER length of {} bytes", n)).into());
    }
    let mut len = 0usize;
    for _ in 0..n {
        len = (len << 8) | s.read_u8()? as usize;
    }
    if len > MAX_DER_LENGTH {
        return Err(Error::BadData(format!("DER length {}", len)).into());
    }
    Ok(len)
}

/// Reads the header of an object with the given tag and returns the
/// body length.
pub(crate) fn read_header(s: &mut Stream, tag: u8) -> Result<usize> {
    let mut t = s.clone();
    let got = t.read_u8()?;
    if got != tag {
        return Err(Error::BadData(
            format!("Expected tag {:#04x}, got {:#04x}", tag, got)).into());
    }
    let len = read_length(&mut t)?;
    *s = t;
    Ok(len)
}

/// Reads any object header, returning the tag and body length.
pub(crate) fn read_any_header(s: &mut Stream) -> Result<(u8, usize)> {
    let mut t = s.clone();
    let tag = t.read_u8()?;
    if tag & 0x1F == 0x1F {
        return Err(Error::BadData("High tag numbers not supported".into())
                   .into());
    }
    let len = read_length(&mut t)?;
    *s = t;
    Ok((tag, len))
}

pub(crate) fn read_sequence(s: &mut Stream) -> Result<usize> {
    read_header(s, BER_SEQUENCE)
}

pub(crate) fn read_set(s: &mut Stream) -> Result<usize> {
    read_header(s, BER_SET)
}

pub(crate) fn read_constructed(s: &mut Stream, n: u8) -> Result<usize> {
    read_header(s, ctag(n))
}

pub(crate) fn read_null(s: &mut Stream) -> Result<()> {
    match read_header(s, BER_NULL)? {
        0 => Ok(()),
        n => Err(Error::BadData(format!("NULL with {} byte body", n)).into()),
    }
}

/// Reads a non-negative INTEGER that fits in a `u64`.
pub(crate) fn read_short_integer(s: &mut Stream) -> Result<u64> {
    read_short_integer_tagged(s, BER_INTEGER)
}

pub(crate) fn read_short_integer_tagged(s: &mut Stream, tag: u8)
                                        -> Result<u64> {
    let len = read_header(s, tag)?;
    if len == 0 || len > 9 {
        return Err(Error::BadData(
            format!("INTEGER of {} bytes", len)).into());
    }
    let body = s.read_bytes(len)?;
    if body[0] & 0x80 != 0 {
        return Err(Error::BadData("Negative INTEGER".into()).into());
    }
    if len == 9 && body[0] != 0 {
        return Err(Error::BadData("INTEGER too large".into()).into());
    }
    Ok(body.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

/// Reads an OCTET STRING whose length is within `min..=max`.
pub(crate) fn read_octet_string<'a>(s: &mut Stream<'a>, min: usize,
                                    max: usize)
                                    -> Result<&'a [u8]> {
    read_octet_string_tagged(s, BER_OCTETSTRING, min, max)
}

pub(crate) fn read_octet_string_tagged<'a>(s: &mut Stream<'a>, tag: u8,
                                           min: usize, max: usize)
                                           -> Result<&'a [u8]> {
    let len = read_header(s, tag)?;
    if len < min || len > max {
        return Err(Error::BadData(
            format!("OCTET STRING of {} bytes outside {}..={}",
                    len, min, max)).into());
    }
    s.read_bytes(len)
}

/// Reads the header of an OCTET STRING and returns its body length,
/// leaving the stream at the body.
pub(crate) fn read_octet_string_hole(s: &mut Stream, min: usize)
                                     -> Result<usize> {
    let len = read_header(s, BER_OCTETSTRING)?;
    if len < min {
        return Err(Error::BadData(
            format!("OCTET STRING of {} bytes, expected at least {}",
                    len, min)).into());
    }
    Ok(len)
}

/// Reads the header of a BIT STRING and the unused bits octet.
/// Returns the length of the remaining body.
pub(crate) fn read_bit_string_hole(s: &mut Stream, min: usize)
                                   -> Result<usize> {
    let mut t = s.clone();
    let len = read_header(&mut t, BER_BITSTRING)?;
    if len < 1 + min {
        return Err(Error::BadData(
            format!("BIT STRING of {} bytes, expected at least {}",
                    len, 1 + min)).into());
    }
    if t.read_u8()? != 0 {
        return Err(Error::BadData(
            "BIT STRING with unused bits".into()).into());
    }
    *s = t;
    Ok(len - 1)
}

/// Reads an OBJECT IDENTIFIER, returning its complete encoding.
pub(crate) fn read_oid<'a>(s: &mut Stream<'a>) -> Result<&'a [u8]> {
    let mut t = s.clone();
    let start = t.tell();
    let len = read_header(&mut t, BER_OBJECT_IDENTIFIER)?;
    if len < 3 || len > 32 {
        return Err(Error::BadData(
            format!("OBJECT IDENTIFIER of {} bytes", len)).into());
    }
    t.skip(len)?;
    let oid = &t.buffer()[start..t.tell()];
    *s = t;
    Ok(oid)
}

/// Reads a complete object, returning its encoding including the
/// header.
pub(crate) fn read_raw_object<'a>(s: &mut Stream<'a>) -> Result<&'a [u8]> {
    let mut t = s.clone();
    let start = t.tell();
    let (_, len) = read_any_header(&mut t)?;
    t.skip(len)?;
    let raw = &t.buffer()[start..t.tell()];
    *s = t;
    Ok(raw)
}

/// Skips a complete object.
pub(crate) fn read_universal(s: &mut Stream) -> Result<()> {
    read_raw_object(s).map(|_| ())
}

/// Returns the content of a DER-encoded object, given its complete
/// encoding.  Used to splice pre-encoded structures into `yasna`
/// writers under a different tag.
pub(crate) fn object_body(der: &[u8]) -> Result<&[u8]> {
    let mut s = Stream::new(der);
    let (_, len) = read_any_header(&mut s)?;
    s.read_bytes(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers() {
        let data = [0x30, 0x81, 0x80];
        let mut s = Stream::new(&data);
        assert_eq!(read_sequence(&mut s).unwrap(), 0x80);

        let data = [0x30, 0x80];
        assert!(read_sequence(&mut Stream::new(&data)).is_err());

        let data = [0x31, 0x00];
        let mut s = Stream::new(&data);
        assert!(read_sequence(&mut s).is_err());
        assert_eq!(s.tell(), 0);
        assert_eq!(read_set(&mut s).unwrap(), 0);
    }

    #[test]
    fn integers() {
        let data = [0x02, 0x01, 0x03, 0x02, 0x02, 0x00, 0x80, 0x02, 0x01, 0xFF];
        let mut s = Stream::new(&data);
        assert_eq!(read_short_integer(&mut s).unwrap(), 3);
        assert_eq!(read_short_integer(&mut s).unwrap(), 128);
        assert!(read_short_integer(&mut s).is_err());
    }

    #[test]
    fn holes() {
        let data = [0x03, 0x03, 0x00, 0xAA, 0xBB];
        let mut s = Stream::new(&data);
        assert_eq!(read_bit_string_hole(&mut s, 2).unwrap(), 2);
        assert_eq!(s.rest(), &[0xAA, 0xBB]);

        let data = [0x03, 0x02, 0x01, 0xAA];
        assert!(read_bit_string_hole(&mut Stream::new(&data), 1).is_err());
    }

    #[test]
    fn raw_objects() {
        let data = [0x30, 0x03, 0x02, 0x01, 0x00, 0x05, 0x00];
        let mut s = Stream::new(&data);
        assert_eq!(read_raw_object(&mut s).unwrap(), &data[..5]);
        read_null(&mut s).unwrap();
        assert_eq!(object_body(&data[..5]).unwrap(), &[0x02, 0x01, 0x00]);
    }
}
