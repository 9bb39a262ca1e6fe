//! Signature blobs.
//!
//! A signature is carried in one of several wire formats.  Each format
//! has a reader that fills in a [`QueryInfo`] and a writer that turns
//! [`SignatureParams`] into the encoded blob.  The readers don't copy
//! the signature value or the signed attributes; they record spans
//! relative to the start of the blob.
//!
//! The format is normally chosen by the caller.  [`detect_format`]
//! recognizes the self-describing ones for callers that only have a
//! blob.
//!
//! # Examples
//!
//! ```
//! # fn main() -> sequoia_envelope::Result<()> {
//! use sequoia_envelope::Algorithm;
//! use sequoia_envelope::signature::{self, SignatureFormat, SignatureParams};
//!
//! let sig = [0x5A; 40];
//! let params = SignatureParams::new(Algorithm::ECDSA, &sig)
//!     .hash(Algorithm::SHA2, 32);
//! let blob = signature::write_signature(SignatureFormat::Ssh, &params)?;
//!
//! let info = signature::read_signature(SignatureFormat::Ssh, &blob)?;
//! assert_eq!(info.crypt_algo, Some(Algorithm::ECDSA));
//! assert_eq!(info.data.slice(&blob)?, &sig[..]);
//! # Ok(()) }
//! ```
//!
//!   [`QueryInfo`]: ../query/struct.QueryInfo.html

use std::fmt;
use std::io;

use crate::asn1;
use crate::Error;
use crate::Result;
use crate::packet::{self, Tag};
use crate::query::QueryInfo;
use crate::stream::Stream;
use crate::types::Algorithm;

mod asn1_formats;
pub mod pgp;
mod wire;

/// The smallest signature value we accept: two 18 byte DLP
/// components.
pub(crate) const MIN_SIGNATURE_SIZE: usize = 36;

/// The largest signature value we accept.
pub(crate) const MAX_SIGNATURE_SIZE: usize = 1024;

/// Signature wire formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignatureFormat {
    /// A bare BIT STRING.
    Raw,
    /// An X.509 AlgorithmIdentifier followed by a BIT STRING.
    X509,
    /// A CMS SignerInfo.
    Cms,
    /// cryptlib's SignerInfo variant, identified by key ID.
    Cryptlib,
    /// A PGP signature packet.
    Pgp,
    /// An SSH signature blob.
    Ssh,
    /// An SSL/TLS 1.0 signature.
    Ssl,
    /// A TLS 1.2 DigitallySigned structure.
    Tls12,
}

impl SignatureFormat {
    /// All formats.
    pub const ALL: &'static [SignatureFormat] = &[
        SignatureFormat::Raw, SignatureFormat::X509, SignatureFormat::Cms,
        SignatureFormat::Cryptlib, SignatureFormat::Pgp, SignatureFormat::Ssh,
        SignatureFormat::Ssl, SignatureFormat::Tls12,
    ];
}

impl fmt::Display for SignatureFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            SignatureFormat::Raw => "raw",
            SignatureFormat::X509 => "X.509",
            SignatureFormat::Cms => "CMS",
            SignatureFormat::Cryptlib => "cryptlib",
            SignatureFormat::Pgp => "PGP",
            SignatureFormat::Ssh => "SSH",
            SignatureFormat::Ssl => "SSL",
            SignatureFormat::Tls12 => "TLS 1.2",
        })
    }
}

/// What goes into an encoded signature.
///
/// Only the signature algorithm and value are always needed; which of
/// the other fields a format uses is documented on the field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureParams<'a> {
    /// The public key algorithm.
    pub sign_algo: Algorithm,
    /// The hash algorithm.  Not used by the raw and SSL formats.
    pub hash_algo: Option<Algorithm>,
    /// The hash algorithm's parameter, the digest size for SHA-2.
    pub hash_param: usize,
    /// The signature value.
    ///
    /// For PGP DSA and ECDSA signatures these are the two MPIs, for
    /// all other PGP signatures the bare RSA value.
    pub signature: &'a [u8],
    /// The signer's key ID (cryptlib, PGP).
    pub key_id: &'a [u8],
    /// The signer's DER-encoded IssuerAndSerialNumber (CMS).
    pub iands: &'a [u8],
    /// The DER-encoded SET of authenticated attributes (CMS).
    pub attributes: Option<&'a [u8]>,
    /// The DER-encoded SET of unauthenticated attributes (CMS).
    pub unauth_attributes: Option<&'a [u8]>,
    /// The PGP signature type.
    pub sig_type: u8,
    /// The PGP signature creation time.
    pub creation_time: u32,
    /// The first two bytes of the signed digest (PGP).
    pub hash_check: [u8; 2],
}

impl<'a> SignatureParams<'a> {
    /// Returns parameters for a signature value made with
    /// `sign_algo`.
    pub fn new(sign_algo: Algorithm, signature: &'a [u8]) -> Self {
        SignatureParams {
            sign_algo,
            hash_algo: None,
            hash_param: 0,
            signature,
            key_id: &[],
            iands: &[],
            attributes: None,
            unauth_attributes: None,
            sig_type: 0,
            creation_time: 0,
            hash_check: [0; 2],
        }
    }

    /// Sets the hash algorithm.
    pub fn hash(mut self, algo: Algorithm, param: usize) -> Self {
        self.hash_algo = Some(algo);
        self.hash_param = param;
        self
    }

    /// Sets the signer's key ID.
    pub fn key_id(mut self, key_id: &'a [u8]) -> Self {
        self.key_id = key_id;
        self
    }

    /// Sets the signer's IssuerAndSerialNumber.
    pub fn issuer_and_serial_number(mut self, iands: &'a [u8]) -> Self {
        self.iands = iands;
        self
    }

    /// Sets the authenticated attributes.
    pub fn attributes(mut self, attributes: &'a [u8]) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Sets the unauthenticated attributes.
    pub fn unauth_attributes(mut self, attributes: &'a [u8]) -> Self {
        self.unauth_attributes = Some(attributes);
        self
    }

    /// Sets the PGP signature type.
    pub fn sig_type(mut self, sig_type: u8) -> Self {
        self.sig_type = sig_type;
        self
    }

    /// Sets the PGP creation time.
    pub fn creation_time(mut self, t: u32) -> Self {
        self.creation_time = t;
        self
    }

    /// Sets the PGP hash quick check.
    pub fn hash_check(mut self, check: [u8; 2]) -> Self {
        self.hash_check = check;
        self
    }

    // Readers reject values outside these bounds, so writers must not
    // produce them.
    pub(crate) fn check_signature_size(&self) -> Result<()> {
        let len = self.signature.len();
        if len < MIN_SIGNATURE_SIZE || len > MAX_SIGNATURE_SIZE {
            return Err(Error::InvalidArgument(
                format!("Signature of {} bytes outside {}..={}",
                        len, MIN_SIGNATURE_SIZE, MAX_SIGNATURE_SIZE)).into());
        }
        Ok(())
    }

    pub(crate) fn require_hash(&self) -> Result<(Algorithm, usize)> {
        self.hash_algo.map(|h| (h, self.hash_param)).ok_or_else(|| {
            Error::InvalidArgument("No hash algorithm given".into()).into()
        })
    }
}

/// Reads a signature from the stream.
pub type ReadFn = fn(&mut Stream) -> Result<QueryInfo>;

/// Writes a signature.
pub type WriteFn = fn(&mut dyn io::Write, &SignatureParams) -> Result<()>;

const SIGNATURE_CODECS: &[(SignatureFormat, ReadFn, WriteFn)] = &[
    (SignatureFormat::Raw, asn1_formats::read_raw, asn1_formats::write_raw),
    (SignatureFormat::X509, asn1_formats::read_x509, asn1_formats::write_x509),
    (SignatureFormat::Cms, asn1_formats::read_cms, asn1_formats::write_cms),
    (SignatureFormat::Cryptlib, asn1_formats::read_cryptlib,
     asn1_formats::write_cryptlib),
    (SignatureFormat::Pgp, pgp::read, pgp::write),
    (SignatureFormat::Ssh, wire::read_ssh, wire::write_ssh),
    (SignatureFormat::Ssl, wire::read_ssl, wire::write_ssl),
    (SignatureFormat::Tls12, wire::read_tls12, wire::write_tls12),
];

/// Returns the reader for `format`.
///
/// The format is chosen by the caller, not by the data, so a missing
/// entry is an internal error.
pub fn get_read_fn(format: SignatureFormat) -> Result<ReadFn> {
    SIGNATURE_CODECS.iter()
        .find(|(f, _, _)| *f == format)
        .map(|(_, r, _)| *r)
        .ok_or_else(|| Error::Internal(
            format!("No reader for {} signatures", format)).into())
}

/// Returns the writer for `format`.
pub fn get_write_fn(format: SignatureFormat) -> Result<WriteFn> {
    SIGNATURE_CODECS.iter()
        .find(|(f, _, _)| *f == format)
        .map(|(_, _, w)| *w)
        .ok_or_else(|| Error::Internal(
            format!("No writer for {} signatures", format)).into())
}

/// Reads a signature in the given format from `data`.
///
/// Spans in the result are relative to the start of `data`.
pub fn read_signature(format: SignatureFormat, data: &[u8])
                      -> Result<QueryInfo>
{
    let read = get_read_fn(format)?;
    read(&mut Stream::new(data))
}

/// Encodes a signature in the given format.
pub fn write_signature(format: SignatureFormat, params: &SignatureParams)
                       -> Result<Vec<u8>>
{
    let write = get_write_fn(format)?;
    let mut o = Vec::new();
    write(&mut o, params)?;
    Ok(o)
}

/// Guesses the format of a signature blob.
///
/// A SEQUENCE whose first element is the INTEGER 1 is a CMS
/// SignerInfo, one starting with 3 a cryptlib signature.  Failing
/// that, a plausible PGP signature packet header identifies PGP.
pub fn detect_format(data: &[u8]) -> Option<SignatureFormat> {
    let mut s = Stream::new(data);
    if asn1::peek_tag(&s).ok()? == asn1::BER_SEQUENCE {
        asn1::read_sequence(&mut s).ok()?;
        return match asn1::read_short_integer(&mut s).ok()? {
            asn1_formats::CMS_VERSION => Some(SignatureFormat::Cms),
            asn1_formats::CRYPTLIB_VERSION => Some(SignatureFormat::Cryptlib),
            _ => None,
        };
    }

    let mut s = Stream::new(data);
    packet::read_object_header(&mut s, Tag::Signature, pgp::MIN_PACKET_SIZE)
        .ok()
        .map(|_| SignatureFormat::Pgp)
}
