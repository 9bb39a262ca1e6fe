//! Cryptographic primitives and the context service.
//!
//! The de-enveloping engine never touches a hash or cipher
//! implementation directly.  It allocates contexts through a
//! [`ContextService`] and refers to them by [`Handle`].  The
//! [`SoftContextService`] backs those handles with the RustCrypto
//! crates.
//!
//!   [`ContextService`]: trait.ContextService.html
//!   [`Handle`]: struct.Handle.html
//!   [`SoftContextService`]: struct.SoftContextService.html

use std::fmt;
use std::ops::{Deref, DerefMut};

use rand_core::RngCore;

use crate::Result;
use crate::types::{Algorithm, CipherMode};

pub mod hash;
pub mod mem;
mod s2k;
pub use self::s2k::S2K;
mod soft;
pub use self::soft::SoftContextService;
pub mod symmetric;

/// Fills the given buffer with random data.
pub fn random<B: AsMut<[u8]>>(mut buf: B) {
    rand_core::OsRng.fill_bytes(buf.as_mut());
}

// Implements slice access and conversions for a wrapper around
// `mem::Protected`.
macro_rules! protected_bytes {
    ( $name:ident ) => {
        impl Deref for $name {
            type Target = [u8];

            fn deref(&self) -> &[u8] {
                &self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(v: Vec<u8>) -> Self {
                $name(v.into())
            }
        }

        impl From<&[u8]> for $name {
            fn from(v: &[u8]) -> Self {
                $name(v.into())
            }
        }
    };
}

/// A session key or key encryption key.
///
/// Cleared when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(mem::Protected);
protected_bytes!(SessionKey);

impl SessionKey {
    /// Creates a random key of `size` bytes.
    pub fn new(size: usize) -> Self {
        let mut key = mem::Protected::zeroed(size);
        random(&mut key[..]);
        SessionKey(key)
    }
}

impl DerefMut for SessionKey {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl AsMut<[u8]> for SessionKey {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SessionKey({} bytes: {:?})", self.len(), self.0)
    }
}

/// A password, cleared when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(mem::Protected);
protected_bytes!(Password);

impl From<&str> for Password {
    fn from(v: &str) -> Self {
        v.as_bytes().into()
    }
}

impl From<String> for Password {
    fn from(v: String) -> Self {
        v.into_bytes().into()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Password({:?})", self.0)
    }
}

/// An opaque reference to a context owned by a [`ContextService`].
///
///   [`ContextService`]: trait.ContextService.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Context attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// The cipher's block size, or a hash's digest size.
    BlockSize,
    /// The size of the IV.
    IvSize,
    /// The size of the key.
    KeySize,
    /// The encryption mode.
    Mode,
    /// The key.  Write only.
    Key,
}

/// The value of an [`Attribute`].
///
///   [`Attribute`]: enum.Attribute.html
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    /// A size in bytes.
    Size(usize),
    /// An encryption mode.
    Mode(CipherMode),
    /// Key material.
    Key(SessionKey),
}

impl AttributeValue {
    /// Returns the value as a size.
    pub fn size(&self) -> Result<usize> {
        match self {
            AttributeValue::Size(n) => Ok(*n),
            v => Err(crate::Error::InvalidArgument(
                format!("{:?} is not a size", v)).into()),
        }
    }
}

/// The hash and cipher provider used by the envelope.
///
/// Every operation is fallible; implementations report a stale or
/// mismatched handle as `Error::InvalidArgument`.
pub trait ContextService {
    /// Creates a context.
    ///
    /// `param` selects the digest size for parametrised hashes and
    /// the key size for ciphers; zero means the default.  `mode` is
    /// ignored for hashes.
    fn create_context(&mut self, algorithm: Algorithm, param: usize,
                      mode: CipherMode) -> Result<Handle>;

    /// Destroys a context.
    fn release_context(&mut self, handle: Handle) -> Result<()>;

    /// Creates an independent copy of a context.
    fn clone_context(&mut self, handle: Handle) -> Result<Handle>;

    /// Returns the algorithm of a context.
    fn algorithm(&self, handle: Handle) -> Result<Algorithm>;

    /// Feeds data to a hash context.
    fn hash_update(&mut self, handle: Handle, data: &[u8]) -> Result<()>;

    /// Finalizes a hash context and returns the digest.
    ///
    /// The context is reset afterwards.
    fn hash_finalize(&mut self, handle: Handle) -> Result<Vec<u8>>;

    /// Reads an attribute.
    fn get_attribute(&self, handle: Handle, attribute: Attribute)
                     -> Result<AttributeValue>;

    /// Sets an attribute.
    fn set_attribute(&mut self, handle: Handle, attribute: Attribute,
                     value: AttributeValue) -> Result<()>;

    /// Encrypts data in place.
    fn encrypt(&mut self, handle: Handle, data: &mut [u8]) -> Result<()>;

    /// Decrypts data in place.
    fn decrypt(&mut self, handle: Handle, data: &mut [u8]) -> Result<()>;

    /// Processes an OpenPGP encrypted data prefix.
    ///
    /// `iv` holds the `block_size + 2` encrypted prefix bytes.  If the
    /// quick check fails, this returns `Error::WrongKey`.  If `mdc`
    /// is given, the decrypted prefix is hashed into it.  Otherwise
    /// the cipher is resynchronised on the ciphertext.
    fn process_iv(&mut self, handle: Handle, iv: &[u8],
                  mdc: Option<Handle>) -> Result<()>;
}
