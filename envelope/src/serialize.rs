//! Serialization support.
//!
//! Objects that have a single canonical encoding implement
//! [`Serialize`].  The format-specific writers of the signature and
//! key exchange modules build on the helpers here.

use std::io;

use crate::Result;

pub(crate) fn write_byte<W: io::Write + ?Sized>(o: &mut W, b: u8)
                                                -> io::Result<()> {
    o.write_all(&[b])
}

pub(crate) fn write_be_u16<W: io::Write + ?Sized>(o: &mut W, n: u16)
                                                  -> io::Result<()> {
    o.write_all(&n.to_be_bytes())
}

pub(crate) fn write_be_u32<W: io::Write + ?Sized>(o: &mut W, n: u32)
                                                  -> io::Result<()> {
    o.write_all(&n.to_be_bytes())
}

/// Writes a 32-bit length-prefixed string, as used by SSH.
pub(crate) fn write_string32<W: io::Write + ?Sized>(o: &mut W, s: &[u8])
                                                    -> io::Result<()> {
    write_be_u32(o, s.len() as u32)?;
    o.write_all(s)
}

/// Serializes an object.
pub trait Serialize {
    /// Writes a serialized version of the object to `o`.
    fn serialize<W: io::Write + ?Sized>(&self, o: &mut W) -> Result<()>;

    /// Returns the length of the serialized form.
    fn serialized_len(&self) -> usize;

    /// Serializes the object to a vector.
    fn to_vec(&self) -> Result<Vec<u8>> {
        let mut o = Vec::with_capacity(self.serialized_len());
        self.serialize(&mut o)?;
        Ok(o)
    }
}
