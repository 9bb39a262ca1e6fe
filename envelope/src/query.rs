//! The result of parsing a key exchange or signature object.
//!
//! A [`QueryInfo`] is filled in by one of the format readers in
//! [`signature`] or [`keyex`].  Sub-structures that are needed later,
//! such as the signature value or the authenticated attributes, are
//! not copied: they are recorded as [`Span`]s relative to the start of
//! the object that was parsed.
//!
//!   [`QueryInfo`]: struct.QueryInfo.html
//!   [`Span`]: struct.Span.html
//!   [`signature`]: ../signature/index.html
//!   [`keyex`]: ../keyex/index.html

use std::fmt;

use crate::Error;
use crate::Result;
use crate::crypto::S2K;
use crate::types::{Algorithm, CipherMode};

/// A byte range within a parsed object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    /// Offset from the start of the object.
    pub start: usize,
    /// Length in bytes.
    pub len: usize,
}

impl Span {
    /// Creates a span.
    pub fn new(start: usize, len: usize) -> Self {
        Span { start, len }
    }

    /// Returns whether the span is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the offset one past the end of the span.
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// Resolves the span against the object it was recorded for.
    ///
    /// # Errors
    ///
    /// Fails with `Error::Internal` if the span lies outside of
    /// `object`.
    pub fn slice<'a>(&self, object: &'a [u8]) -> Result<&'a [u8]> {
        object.get(self.start..self.end()).ok_or_else(|| {
            Error::Internal(format!("{:?} outside of {} byte object",
                                    self, object.len())).into()
        })
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end())
    }
}

/// The kind of object a [`QueryInfo`] describes.
///
///   [`QueryInfo`]: struct.QueryInfo.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// Nothing has been parsed yet.
    None,
    /// A signature.
    Signature,
    /// A password-wrapped (key encryption key) session key.
    EncryptedKey,
    /// A public-key-encrypted session key.
    PkcEncryptedKey,
    /// Encrypted data.
    EncryptedData,
}

impl Default for ObjectType {
    fn default() -> Self {
        ObjectType::None
    }
}

/// How an RSA key transport value is padded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyEncoding {
    /// PKCS #1 v1.5.
    Pkcs1,
    /// OAEP.
    Oaep,
}

impl Default for KeyEncoding {
    fn default() -> Self {
        KeyEncoding::Pkcs1
    }
}

/// Information gathered from one key exchange or signature object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryInfo {
    /// The kind of object.
    pub object_type: ObjectType,
    /// The total size of the object.
    pub size: usize,
    /// The object's format version.
    pub version: u8,

    /// The encryption or public key algorithm.
    pub crypt_algo: Option<Algorithm>,
    /// The encryption mode.
    pub crypt_mode: CipherMode,
    /// The key size in bytes, if explicitly given.
    pub key_size: usize,
    /// The RSA key transport encoding.
    pub key_encoding: KeyEncoding,

    /// The key ID of the key that is needed.
    pub key_id: Vec<u8>,
    /// The IV.
    pub iv: Vec<u8>,

    /// The key derivation hash or PRF.
    pub key_setup_algo: Option<Algorithm>,
    /// The key derivation algorithm's parameter.
    pub key_setup_param: usize,
    /// The key derivation iteration count, or for PGP the number of
    /// bytes hashed.
    pub key_setup_iterations: u32,
    /// The key derivation salt.
    pub salt: Vec<u8>,
    /// The PGP S2K specifier, if any.
    pub s2k: Option<S2K>,

    /// The signature's hash algorithm.
    pub hash_algo: Option<Algorithm>,
    /// The hash algorithm's parameter.
    pub hash_param: usize,
    /// The first two bytes of the signed hash (PGP only).
    pub hash_check: Option<[u8; 2]>,
    /// The PGP signature type.
    pub sig_type: u8,

    /// The encrypted key or the signature value.
    pub data: Span,
    /// The issuerAndSerialNumber.
    pub iands: Span,
    /// Authenticated attributes or, for PGP, the hashed information.
    pub attributes: Span,
    /// Unauthenticated attributes.
    pub unauth_attributes: Span,
    /// Key derivation parameters.
    pub kdf_params: Span,
}

impl QueryInfo {
    /// Creates an empty query result for the given object type.
    pub fn new(object_type: ObjectType) -> Self {
        QueryInfo { object_type, ..Default::default() }
    }

    /// Shifts every span by `offset`.
    ///
    /// Readers record spans relative to the position they were
    /// started at.  When the object is embedded in a larger buffer,
    /// this moves the spans to be relative to that buffer.
    pub fn rebase(&mut self, offset: usize) {
        for span in [&mut self.data, &mut self.iands, &mut self.attributes,
                     &mut self.unauth_attributes, &mut self.kdf_params]
            .iter_mut()
        {
            if !span.is_empty() {
                span.start += offset;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans() {
        let object = [0u8, 1, 2, 3, 4, 5];
        let s = Span::new(2, 3);
        assert_eq!(s.slice(&object).unwrap(), &[2, 3, 4]);
        assert_eq!(s.to_string(), "2..5");
        assert!(Span::new(4, 3).slice(&object).is_err());
        assert!(Span::default().slice(&object).unwrap().is_empty());
    }

    #[test]
    fn rebase() {
        let mut q = QueryInfo::new(ObjectType::Signature);
        q.data = Span::new(3, 4);
        q.rebase(10);
        assert_eq!(q.data, Span::new(13, 4));
        assert_eq!(q.attributes, Span::default());
    }
}
