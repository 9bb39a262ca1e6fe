//! Incremental de-enveloping of PGP messages.
//!
//! This crate implements the machinery needed to take a PGP message
//! apart as its bytes trickle in: a codec for PGP's packet headers
//! and length encodings, ASN.1 algorithm identifier tables, readers
//! and writers for the signature and key exchange blobs used by
//! X.509, CMS, cryptlib, PGP, SSH and TLS, and a resumable state
//! machine that drives a buffer through a PGP message, records what
//! keying material the caller has to supply, and delivers the payload
//! while keeping decryption, hashing and decompression in step.
//!
//! The cryptographic primitives are reached through the
//! [`ContextService`] trait.  A software implementation backed by the
//! RustCrypto crates is provided as [`SoftContextService`].
//!
//! A typical decryption of a password protected message looks like
//! this:
//!
//! ```
//! # fn main() -> sequoia_envelope::Result<()> {
//! use sequoia_envelope::{Config, Envelope, Progress};
//!
//! # let message: &[u8] = &[0xcb, 0x0a, b'b', 0, 0, 0, 0, 0,
//! #                        b'h', b'e', b'l', b'l'];
//! let mut envelope = Envelope::new(Config::default());
//! let pushed = envelope.push(message)?;
//! if let Progress::NeedResource(_) = pushed.progress {
//!     envelope.add_password(b"swordfish")?;
//! }
//! envelope.flush()?;
//!
//! let mut plaintext = Vec::new();
//! let mut buf = [0u8; 4096];
//! loop {
//!     let n = envelope.pop(&mut buf)?;
//!     if n == 0 {
//!         break;
//!     }
//!     plaintext.extend_from_slice(&buf[..n]);
//! }
//! assert_eq!(&plaintext[..], b"hell");
//! # Ok(())
//! # }
//! ```
//!
//! [`ContextService`]: crypto::ContextService
//! [`SoftContextService`]: crypto::SoftContextService

#![warn(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

#[macro_use]
mod macros;

pub mod algid;
mod asn1;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod keyex;
pub mod message;
pub mod packet;
pub mod query;
pub mod serialize;
pub mod signature;
pub mod stream;
pub mod types;

pub use crate::config::Config;
pub use crate::envelope::{
    ContentListItem,
    Envelope,
    EnvInfo,
    Progress,
    Pushed,
};
pub use crate::message::{open, Message};
pub use crate::types::{
    Algorithm,
    CipherMode,
    ContentType,
    Usage,
};

/// Crate result specialization.
pub type Result<T> = ::std::result::Result<T, anyhow::Error>;

/// Errors returned by this crate.
///
/// Note: This enum cannot be exhaustively matched to allow future
/// extensions.
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid operation.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The input violates the structural rules of its format.
    ///
    /// This includes exceeded sanity bounds on packet, subpacket and
    /// segment counts.
    #[error("Bad data: {0}")]
    BadData(String),

    /// More input is required.
    #[error("Insufficient data")]
    Underflow,

    /// A recognized but unsupported feature or algorithm.
    #[error("Not available: {0}")]
    NotAvailable(String),

    /// An integrity check failed.
    #[error("Bad signature: {0}")]
    BadSignature(String),

    /// The supplied key or password does not decrypt the data.
    #[error("Wrong key")]
    WrongKey,

    /// A value is well formed but semantically invalid.
    #[error("Invalid: {0}")]
    Invalid(String),

    /// An internal invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The outcome of a parse step that may legitimately decline.
///
/// `Skip` tells the caller that the object was recognized but should
/// be passed over rather than treated as a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The object was processed.
    Ready(T),
    /// The object should be skipped.
    Skip,
}

impl<T> Outcome<T> {
    /// Returns the value, or the given error if the object was
    /// skipped.
    pub fn ready_or(self, err: Error) -> Result<T> {
        match self {
            Outcome::Ready(v) => Ok(v),
            Outcome::Skip => Err(err.into()),
        }
    }
}

/// Returns the crate error kind of `err`, if any.
pub fn error_kind(err: &anyhow::Error) -> Option<&Error> {
    err.downcast_ref::<Error>()
}
