//! Multiprecision integers.
//!
//! PGP frames an integer as a big-endian 16-bit bit count followed by
//! the magnitude.  See [Section 3.2 of RFC 4880].
//!
//!   [Section 3.2 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-3.2

use std::io;

use crate::Error;
use crate::Result;
use crate::serialize::write_be_u16;
use crate::stream::Stream;

/// Reads an MPI and returns its magnitude.
///
/// The magnitude's length in bytes has to be within
/// `min_bytes..=max_bytes`.
pub fn read_mpi<'a>(s: &mut Stream<'a>, min_bytes: usize, max_bytes: usize)
                    -> Result<&'a [u8]>
{
    let mut t = s.clone();
    let bits = t.read_be_u16()? as usize;
    let bytes = (bits + 7) / 8;
    if bytes < min_bytes || bytes > max_bytes {
        return Err(Error::BadData(
            format!("MPI of {} bytes outside {}..={}",
                    bytes, min_bytes, max_bytes)).into());
    }
    let value = t.read_bytes(bytes)?;
    *s = t;
    Ok(value)
}

/// Returns the serialized size of an MPI with magnitude `value`.
pub fn mpi_len(value: &[u8]) -> usize {
    2 + strip_leading_zeros(value).len()
}

/// Writes `value` as an MPI.
///
/// Leading zero bytes are stripped.
pub fn write_mpi<W: io::Write + ?Sized>(o: &mut W, value: &[u8]) -> Result<()> {
    let value = strip_leading_zeros(value);
    if value.len() > 8191 {
        return Err(Error::InvalidArgument(
            format!("MPI of {} bytes is too large", value.len())).into());
    }
    let bits = match value.first() {
        Some(b) => value.len() * 8 - b.leading_zeros() as usize,
        None => 0,
    };
    write_be_u16(o, bits as u16)?;
    o.write_all(value)?;
    Ok(())
}

fn strip_leading_zeros(value: &[u8]) -> &[u8] {
    let offset = value.iter().take_while(|&&b| b == 0).count();
    &value[offset..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut buf = Vec::new();
        write_mpi(&mut buf, &[0, 0, 0x01, 0xFF]).unwrap();
        assert_eq!(buf, vec![0, 9, 0x01, 0xFF]);
        assert_eq!(mpi_len(&[0, 0, 0x01, 0xFF]), buf.len());

        let mut s = Stream::new(&buf);
        assert_eq!(read_mpi(&mut s, 1, 2).unwrap(), &[0x01, 0xFF]);
        let mut s = Stream::new(&buf);
        assert!(read_mpi(&mut s, 3, 4).is_err());
        assert_eq!(s.tell(), 0);
    }

    #[test]
    fn truncated() {
        let buf = [0, 16, 0xAA];
        let e = read_mpi(&mut Stream::new(&buf), 1, 2).unwrap_err();
        assert_eq!(e.downcast_ref::<Error>(), Some(&Error::Underflow));
    }
}
