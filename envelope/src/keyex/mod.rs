//! Key exchange objects.
//!
//! Two kinds of object carry a session key: key transport objects
//! hold it encrypted to a public key, key encryption key (KEK)
//! objects hold it encrypted with a key derived from a password.  Each
//! kind has a table of per-format readers and writers.
//!
//! The readers fill in a [`QueryInfo`]; the encrypted key itself is
//! located through [`QueryInfo::data`].
//!
//!   [`QueryInfo`]: ../query/struct.QueryInfo.html
//!   [`QueryInfo::data`]: ../query/struct.QueryInfo.html#structfield.data

use std::fmt;
use std::io;

use crate::Error;
use crate::Result;
use crate::crypto::S2K;
use crate::query::QueryInfo;
use crate::stream::Stream;
use crate::types::{Algorithm, CipherMode};

mod cms;
pub mod pgp;

/// Key exchange wire formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyexFormat {
    /// CMS RecipientInfo.
    Cms,
    /// CMS KeyTransRecipientInfo with RSA-OAEP.  Only written.
    CmsOaep,
    /// cryptlib's RecipientInfo variants, identified by key ID.
    Cryptlib,
    /// PGP session key packets.
    Pgp,
}

impl fmt::Display for KeyexFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            KeyexFormat::Cms => "CMS",
            KeyexFormat::CmsOaep => "CMS (OAEP)",
            KeyexFormat::Cryptlib => "cryptlib",
            KeyexFormat::Pgp => "PGP",
        })
    }
}

/// How the key encryption key is derived from the password.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeySetup<'a> {
    /// PBKDF2, as used by CMS and cryptlib.
    Pbkdf2 {
        /// The salt.
        salt: &'a [u8],
        /// The iteration count.
        iterations: u32,
        /// The PRF, an HMAC.
        prf: Algorithm,
        /// The PRF's parameter, the digest size for HMAC-SHA2.
        prf_param: usize,
    },
    /// An OpenPGP String-to-Key specifier.
    S2K(S2K),
}

/// What goes into a key encryption key object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KekParams<'a> {
    /// The cipher the session key is wrapped with.
    pub crypt_algo: Algorithm,
    /// The cipher's key size in bytes.
    pub key_size: usize,
    /// The cipher mode.  Not used by PGP.
    pub mode: CipherMode,
    /// The IV.  Not used by PGP.
    pub iv: &'a [u8],
    /// The key derivation.
    pub key_setup: KeySetup<'a>,
    /// The wrapped session key.
    ///
    /// PGP allows this to be empty, the derived key then being the
    /// session key.
    pub encrypted_key: &'a [u8],
}

/// What goes into a key transport object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyTransParams<'a> {
    /// The public key algorithm.
    pub pkc_algo: Algorithm,
    /// The recipient's key ID (cryptlib, PGP).
    pub key_id: &'a [u8],
    /// The recipient's DER-encoded IssuerAndSerialNumber (CMS).
    pub iands: &'a [u8],
    /// The encrypted session key.
    ///
    /// For PGP Elgamal this is the two encoded MPIs, otherwise the
    /// bare value.
    pub encrypted_key: &'a [u8],
}

/// Reads a key exchange object from the stream.
pub type ReadFn = fn(&mut Stream) -> Result<QueryInfo>;

/// Writes a key encryption key object.
pub type KekWriteFn = fn(&mut dyn io::Write, &KekParams) -> Result<()>;

/// Writes a key transport object.
pub type KeyTransWriteFn =
    fn(&mut dyn io::Write, &KeyTransParams) -> Result<()>;

const KEYTRANS_READERS: &[(KeyexFormat, ReadFn)] = &[
    (KeyexFormat::Cms, cms::read_cms_keytrans),
    (KeyexFormat::Cryptlib, cms::read_cryptlib_keytrans),
    (KeyexFormat::Pgp, pgp::read_pke),
];

const KEYTRANS_WRITERS: &[(KeyexFormat, KeyTransWriteFn)] = &[
    (KeyexFormat::Cms, cms::write_cms_keytrans),
    (KeyexFormat::CmsOaep, cms::write_cms_oaep_keytrans),
    (KeyexFormat::Cryptlib, cms::write_cryptlib_keytrans),
    (KeyexFormat::Pgp, pgp::write_pke),
];

// CMS and cryptlib share the password recipient format.
const KEK_READERS: &[(KeyexFormat, ReadFn)] = &[
    (KeyexFormat::Cms, cms::read_kek),
    (KeyexFormat::Cryptlib, cms::read_kek),
    (KeyexFormat::Pgp, pgp::read_ske),
];

const KEK_WRITERS: &[(KeyexFormat, KekWriteFn)] = &[
    (KeyexFormat::Cms, cms::write_kek),
    (KeyexFormat::Cryptlib, cms::write_kek),
    (KeyexFormat::Pgp, pgp::write_ske),
];

fn lookup<F: Copy>(table: &[(KeyexFormat, F)], format: KeyexFormat,
                   what: &str)
                   -> Result<F>
{
    table.iter()
        .find(|(f, _)| *f == format)
        .map(|(_, func)| *func)
        .ok_or_else(|| Error::Internal(
            format!("No {} for {} key exchange", what, format)).into())
}

/// Returns the key transport reader for `format`.
pub fn get_keytrans_read_fn(format: KeyexFormat) -> Result<ReadFn> {
    lookup(KEYTRANS_READERS, format, "key transport reader")
}

/// Returns the key transport writer for `format`.
pub fn get_keytrans_write_fn(format: KeyexFormat) -> Result<KeyTransWriteFn> {
    lookup(KEYTRANS_WRITERS, format, "key transport writer")
}

/// Returns the key encryption key reader for `format`.
pub fn get_kek_read_fn(format: KeyexFormat) -> Result<ReadFn> {
    lookup(KEK_READERS, format, "KEK reader")
}

/// Returns the key encryption key writer for `format`.
pub fn get_kek_write_fn(format: KeyexFormat) -> Result<KekWriteFn> {
    lookup(KEK_WRITERS, format, "KEK writer")
}

/// Reads a key transport object from `data`.
pub fn read_keytrans(format: KeyexFormat, data: &[u8]) -> Result<QueryInfo> {
    let read = get_keytrans_read_fn(format)?;
    read(&mut Stream::new(data))
}

/// Encodes a key transport object.
pub fn write_keytrans(format: KeyexFormat, params: &KeyTransParams)
                      -> Result<Vec<u8>>
{
    let write = get_keytrans_write_fn(format)?;
    let mut o = Vec::new();
    write(&mut o, params)?;
    Ok(o)
}

/// Reads a key encryption key object from `data`.
pub fn read_kek(format: KeyexFormat, data: &[u8]) -> Result<QueryInfo> {
    let read = get_kek_read_fn(format)?;
    read(&mut Stream::new(data))
}

/// Encodes a key encryption key object.
pub fn write_kek(format: KeyexFormat, params: &KekParams) -> Result<Vec<u8>> {
    let write = get_kek_write_fn(format)?;
    let mut o = Vec::new();
    write(&mut o, params)?;
    Ok(o)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ObjectType;

    // A minimal IssuerAndSerialNumber.
    const IANDS: &[u8] =
        &[0x30, 0x07, 0x30, 0x00, 0x02, 0x03, 0x01, 0x00, 0x01];

    #[test]
    fn oaep_is_write_only() {
        let e = read_keytrans(KeyexFormat::CmsOaep, &[0x30, 0x00])
            .unwrap_err();
        assert!(matches!(e.downcast_ref::<Error>(), Some(Error::Internal(_))));
        assert!(get_kek_read_fn(KeyexFormat::CmsOaep).is_err());
        assert!(get_kek_write_fn(KeyexFormat::CmsOaep).is_err());
        assert!(get_keytrans_write_fn(KeyexFormat::CmsOaep).is_ok());
    }

    #[test]
    fn keytrans_all_formats() {
        let key = [0x6B; 256];
        for format in &[KeyexFormat::Cms, KeyexFormat::Cryptlib,
                        KeyexFormat::Pgp] {
            let p = KeyTransParams {
                pkc_algo: Algorithm::RSA,
                key_id: &[0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80],
                iands: IANDS,
                encrypted_key: &key,
            };
            let blob = write_keytrans(*format, &p).unwrap();
            let info = read_keytrans(*format, &blob).unwrap();
            assert_eq!(info.object_type, ObjectType::PkcEncryptedKey);
            assert_eq!(info.size, blob.len(), "{}", format);
            assert_eq!(info.crypt_algo, Some(Algorithm::RSA));
            assert_eq!(info.data.slice(&blob).unwrap(), &key[..]);
            match format {
                KeyexFormat::Cms =>
                    assert_eq!(info.iands.slice(&blob).unwrap(), IANDS),
                _ => assert_eq!(info.key_id, p.key_id),
            }
        }
    }

    #[test]
    fn kek_all_formats() {
        let wrapped = [0x2A; 33];
        let iv = [0x01; 16];
        let salt = [0x5A; 8];
        for format in &[KeyexFormat::Cms, KeyexFormat::Cryptlib,
                        KeyexFormat::Pgp] {
            let key_setup = match format {
                KeyexFormat::Pgp => KeySetup::S2K(S2K::Iterated {
                    hash: Algorithm::SHA1,
                    hash_param: 0,
                    salt,
                    hash_bytes: 65536,
                }),
                _ => KeySetup::Pbkdf2 {
                    salt: &salt,
                    iterations: 2000,
                    prf: Algorithm::HmacSHA1,
                    prf_param: 0,
                },
            };
            let p = KekParams {
                crypt_algo: Algorithm::AES,
                key_size: 32,
                mode: CipherMode::CBC,
                iv: &iv,
                key_setup,
                encrypted_key: &wrapped,
            };
            let blob = write_kek(*format, &p).unwrap();
            let info = read_kek(*format, &blob).unwrap();
            assert_eq!(info.object_type, ObjectType::EncryptedKey);
            assert_eq!(info.size, blob.len());
            assert_eq!(info.crypt_algo, Some(Algorithm::AES));
            assert_eq!(info.key_size, 32);
            assert_eq!(info.salt, salt);
            assert_eq!(info.data.slice(&blob).unwrap(), &wrapped[..]);
            match format {
                KeyexFormat::Pgp => {
                    assert_eq!(info.key_setup_algo, Some(Algorithm::SHA1));
                    assert_eq!(info.key_setup_iterations, 65536);
                    assert_eq!(info.crypt_mode, CipherMode::CFB);
                }
                _ => {
                    assert_eq!(info.key_setup_algo, Some(Algorithm::HmacSHA1));
                    assert_eq!(info.key_setup_iterations, 2000);
                    assert_eq!(info.crypt_mode, CipherMode::CBC);
                    assert_eq!(info.iv, iv);
                }
            }
        }
    }
}
