//! A cursor over an in-memory buffer.
//!
//! All readers in this crate work on a [`Stream`].  Running off the
//! end of the data is reported as [`Error::Underflow`], which the
//! state machine treats as a request for more input.

use crate::Error;
use crate::Result;

/// A read cursor over a borrowed byte slice.
#[derive(Clone, Debug)]
pub struct Stream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Stream<'a> {
    /// Returns a cursor positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Stream { data, pos: 0 }
    }

    /// Returns the current position.
    pub fn tell(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to `pos`.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::Underflow.into());
        }
        self.pos = pos;
        Ok(())
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns the whole underlying buffer.
    pub fn buffer(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the unread bytes without consuming them.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the next `amount` bytes without consuming them.
    pub fn peek(&self, amount: usize) -> Result<&'a [u8]> {
        if self.remaining() < amount {
            return Err(Error::Underflow.into());
        }
        Ok(&self.data[self.pos..self.pos + amount])
    }

    /// Consumes and returns the next `amount` bytes.
    pub fn read_bytes(&mut self, amount: usize) -> Result<&'a [u8]> {
        let r = self.peek(amount)?;
        self.pos += amount;
        Ok(r)
    }

    /// Skips `amount` bytes.
    pub fn skip(&mut self, amount: usize) -> Result<()> {
        self.read_bytes(amount).map(|_| ())
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Peeks at the next byte.
    pub fn peek_u8(&self) -> Result<u8> {
        Ok(self.peek(1)?[0])
    }

    /// Reads a big-endian 16-bit integer.
    pub fn read_be_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Reads a big-endian 32-bit integer.
    pub fn read_be_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a 32-bit length-prefixed string, as used by SSH.
    pub fn read_string32(&mut self, max: usize) -> Result<&'a [u8]> {
        let len = self.read_be_u32()? as usize;
        if len > max {
            return Err(Error::BadData(
                format!("string length {} exceeds {}", len, max)).into());
        }
        self.read_bytes(len)
    }

    /// Returns a cursor over the next `amount` bytes and skips them.
    pub fn sub_stream(&mut self, amount: usize) -> Result<Stream<'a>> {
        Ok(Stream::new(self.read_bytes(amount)?))
    }
}

/// Reports running out of data as `BadData`.
///
/// Used while parsing a structure that is known to be complete: an
/// underflow there means that the structure's own lengths are wrong,
/// not that more input is needed.
pub(crate) fn truncated(e: anyhow::Error, what: &str) -> anyhow::Error {
    match e.downcast_ref::<Error>() {
        Some(Error::Underflow) =>
            Error::BadData(format!("Truncated {}", what)).into(),
        _ => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads() {
        let data = [1, 2, 3, 4, 5, 6, 7];
        let mut s = Stream::new(&data);
        assert_eq!(s.read_u8().unwrap(), 1);
        assert_eq!(s.read_be_u16().unwrap(), 0x0203);
        assert_eq!(s.peek(2).unwrap(), &[4, 5]);
        assert_eq!(s.read_be_u32().unwrap(), 0x04050607);
        assert_eq!(s.remaining(), 0);
        let e = s.read_u8().unwrap_err();
        assert_eq!(e.downcast_ref::<Error>(), Some(&Error::Underflow));
        // A failed read doesn't move the cursor.
        assert_eq!(s.tell(), 7);
        s.seek(1).unwrap();
        assert!(s.read_be_u32().is_ok());
    }

    #[test]
    fn strings() {
        let data = [0, 0, 0, 3, b'a', b'b', b'c', 0, 0, 0, 9, b'x'];
        let mut s = Stream::new(&data);
        assert_eq!(s.read_string32(16).unwrap(), b"abc");
        let mut t = s.clone();
        assert!(t.read_string32(4).is_err());
        let e = s.read_string32(16).unwrap_err();
        assert_eq!(e.downcast_ref::<Error>(), Some(&Error::Underflow));
        let e = truncated(e, "string");
        assert_eq!(e.downcast_ref::<Error>(),
                   Some(&Error::BadData("Truncated string".into())));
    }
}
