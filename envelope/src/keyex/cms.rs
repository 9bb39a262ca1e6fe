//! The DER-based key exchange formats.
//!
//! Key transport uses CMS's KeyTransRecipientInfo, identified either
//! by IssuerAndSerialNumber (version 0) or, for cryptlib, by key ID
//! (version 2).  Password-based key exchange uses CMS's
//! PasswordRecipientInfo with PBKDF2, see [RFC 3211].
//!
//!   [RFC 3211]: https://tools.ietf.org/html/rfc3211

use std::io;

use crate::algid::{self, AlgoClass, Param};
use crate::asn1;
use crate::Error;
use crate::Result;
use crate::keyex::{KekParams, KeySetup, KeyTransParams};
use crate::query::{KeyEncoding, ObjectType, QueryInfo, Span};
use crate::stream::Stream;
use crate::types::{
    Algorithm,
    MAX_KEYSETUP_ITERATIONS,
    MAX_PKCSIZE,
    MAX_WORKING_KEYSIZE,
    MIN_KEYSIZE,
    MIN_PKCSIZE,
};

const KEYTRANS_VERSION: u64 = 0;
const CRYPTLIB_KEYTRANS_VERSION: u64 = 2;
const PWRI_VERSION: u64 = 0;
const KEKRI_VERSION: u64 = 4;

// RecipientInfo choices.
const KEKRI_TAG: u8 = asn1::ctag(2);
const PWRI_TAG: u8 = asn1::ctag(3);

/// id-PBKDF2, 1.2.840.113549.1.5.12.
const OID_PBKDF2: &[u8] =
    &[0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x05, 0x0C];

/// id-alg-PWRI-KEK, 1.2.840.113549.1.9.16.3.9.
const OID_PWRI_KEK: &[u8] = &[0x06, 0x0B, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D,
                              0x01, 0x09, 0x10, 0x03, 0x09];

/// id-RSAES-OAEP, 1.2.840.113549.1.1.7.
const OID_RSA_OAEP: &[u8] =
    &[0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x07];

const MIN_SALT: usize = 2;
const MAX_SALT: usize = 64;

fn check_end(t: &Stream, end: usize, start: usize, what: &str) -> Result<()> {
    if t.tell() != end {
        return Err(bad_data!("{} ends at {}, expected {}",
                             what, t.tell() - start, end - start));
    }
    Ok(())
}

fn read_version(t: &mut Stream, expected: u64, what: &str) -> Result<u8> {
    let v = asn1::read_short_integer(t)?;
    if v != expected {
        return Err(bad_data!("{} version {}, expected {}", what, v, expected));
    }
    Ok(v as u8)
}

// Reads the encrypted key of a key transport object.
fn read_encrypted_key(t: &mut Stream, start: usize, info: &mut QueryInfo)
                      -> Result<()>
{
    let len = asn1::read_octet_string_hole(t, MIN_PKCSIZE)?;
    if len > MAX_PKCSIZE {
        return Err(bad_data!("Encrypted key of {} bytes", len));
    }
    info.data = Span::new(t.tell() - start, len);
    t.skip(len)
}

// Reads the key encryption algorithm of a KeyTransRecipientInfo.
// RSA-OAEP carries RSAES-OAEP-params that we don't interpret.
fn read_keytrans_algo(t: &mut Stream, info: &mut QueryInfo) -> Result<()> {
    let mut u = t.clone();
    let len = asn1::read_sequence(&mut u)?;
    let end = u.tell() + len;
    if u.peek(OID_RSA_OAEP.len()).ok() == Some(OID_RSA_OAEP) {
        u.seek(end)?;
        info.crypt_algo = Some(Algorithm::RSA);
        info.key_encoding = KeyEncoding::Oaep;
        *t = u;
        return Ok(());
    }

    let id = algid::read_algo_id(t, AlgoClass::Pkc)?;
    info.crypt_algo = Some(id.algorithm);
    info.key_encoding = KeyEncoding::Pkcs1;
    Ok(())
}

/// Reads a KeyTransRecipientInfo identified by
/// IssuerAndSerialNumber.
pub(crate) fn read_cms_keytrans(s: &mut Stream) -> Result<QueryInfo> {
    let mut t = s.clone();
    let start = t.tell();
    let mut info = QueryInfo::new(ObjectType::PkcEncryptedKey);

    let len = asn1::read_sequence(&mut t)?;
    let end = t.tell() + len;
    info.version = read_version(&mut t, KEYTRANS_VERSION,
                                "KeyTransRecipientInfo")?;

    let pos = t.tell();
    if asn1::peek_tag(&t)? != asn1::BER_SEQUENCE {
        return Err(bad_data!("Invalid IssuerAndSerialNumber"));
    }
    let iands = asn1::read_raw_object(&mut t)?;
    info.iands = Span::new(pos - start, iands.len());

    read_keytrans_algo(&mut t, &mut info)?;
    read_encrypted_key(&mut t, start, &mut info)?;
    check_end(&t, end, start, "KeyTransRecipientInfo")?;

    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

/// Reads a KeyTransRecipientInfo identified by key ID.
pub(crate) fn read_cryptlib_keytrans(s: &mut Stream) -> Result<QueryInfo> {
    let mut t = s.clone();
    let start = t.tell();
    let mut info = QueryInfo::new(ObjectType::PkcEncryptedKey);

    let len = asn1::read_sequence(&mut t)?;
    let end = t.tell() + len;
    info.version = read_version(&mut t, CRYPTLIB_KEYTRANS_VERSION,
                                "KeyTransRecipientInfo")?;
    info.key_id = asn1::read_octet_string_tagged(
        &mut t, asn1::ptag(0), 8, 64)?.to_vec();

    let id = algid::read_algo_id(&mut t, AlgoClass::Pkc)?;
    info.crypt_algo = Some(id.algorithm);
    read_encrypted_key(&mut t, start, &mut info)?;
    check_end(&t, end, start, "KeyTransRecipientInfo")?;

    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

fn write_keytrans(o: &mut dyn io::Write, p: &KeyTransParams, oaep: bool,
                  by_key_id: bool)
                  -> Result<()>
{
    if p.encrypted_key.len() < MIN_PKCSIZE
        || p.encrypted_key.len() > MAX_PKCSIZE
    {
        return Err(Error::InvalidArgument(
            format!("Encrypted key of {} bytes", p.encrypted_key.len()))
                   .into());
    }
    if by_key_id && p.key_id.len() < 8 {
        return Err(Error::InvalidArgument(
            format!("Key ID of {} bytes", p.key_id.len())).into());
    }
    if ! by_key_id {
        asn1::object_body(p.iands).map_err(|_| Error::InvalidArgument(
            "Malformed IssuerAndSerialNumber".into()))?;
    }
    let algo_id = if oaep {
        None
    } else {
        Some(algid::write_algo_id(p.pkc_algo, Param::None, Param::None)?)
    };

    let der = yasna::construct_der(|w| {
        w.write_sequence(|w| {
            if by_key_id {
                w.next().write_u32(CRYPTLIB_KEYTRANS_VERSION as u32);
                w.next().write_tagged_implicit(yasna::Tag::context(0), |w| {
                    w.write_bytes(p.key_id)
                });
            } else {
                w.next().write_u32(KEYTRANS_VERSION as u32);
                w.next().write_der(p.iands);
            }
            match &algo_id {
                Some(id) => w.next().write_der(id),
                None => w.next().write_sequence(|w| {
                    w.next().write_der(OID_RSA_OAEP);
                    w.next().write_sequence(|_| ());
                }),
            }
            w.next().write_bytes(p.encrypted_key);
        })
    });
    o.write_all(&der)?;
    Ok(())
}

pub(crate) fn write_cms_keytrans(o: &mut dyn io::Write, p: &KeyTransParams)
                                 -> Result<()> {
    write_keytrans(o, p, false, false)
}

pub(crate) fn write_cms_oaep_keytrans(o: &mut dyn io::Write,
                                      p: &KeyTransParams)
                                      -> Result<()> {
    if p.pkc_algo != Algorithm::RSA {
        return Err(Error::InvalidArgument(
            format!("OAEP with {}", p.pkc_algo)).into());
    }
    write_keytrans(o, p, true, false)
}

pub(crate) fn write_cryptlib_keytrans(o: &mut dyn io::Write,
                                      p: &KeyTransParams)
                                      -> Result<()> {
    write_keytrans(o, p, false, true)
}

// Reads the keyDerivationAlgorithm, the [0] tagged
// AlgorithmIdentifier for PBKDF2:
//
//   PBKDF2-params ::= SEQUENCE {
//       salt OCTET STRING,
//       iterationCount INTEGER (1..MAX),
//       keyLength INTEGER (1..MAX) OPTIONAL,
//       prf AlgorithmIdentifier DEFAULT hmacWithSHA1 }
fn read_pbkdf2(t: &mut Stream, start: usize, info: &mut QueryInfo)
               -> Result<Option<usize>>
{
    tracer!("keyex::cms::read_pbkdf2");

    let pos = t.tell();
    let len = asn1::read_constructed(t, 0)?;
    let end = t.tell() + len;
    info.kdf_params = Span::new(pos - start, end - pos);

    let oid = asn1::read_oid(t)?;
    if oid != OID_PBKDF2 {
        return Err(Error::NotAvailable(
            "Key derivation other than PBKDF2".into()).into());
    }

    let len = asn1::read_sequence(t)?;
    let params_end = t.tell() + len;
    info.salt = asn1::read_octet_string(t, MIN_SALT, MAX_SALT)?.to_vec();
    let iterations = asn1::read_short_integer(t)?;
    if iterations < 1 || iterations > MAX_KEYSETUP_ITERATIONS {
        return Err(bad_data!("PBKDF2 with {} iterations", iterations));
    }
    info.key_setup_iterations = iterations as u32;

    let mut key_length = None;
    if t.tell() < params_end && asn1::peek_tag(t)? == asn1::BER_INTEGER {
        let l = asn1::read_short_integer(t)? as usize;
        if l < MIN_KEYSIZE || l > MAX_WORKING_KEYSIZE {
            return Err(bad_data!("PBKDF2 key length {}", l));
        }
        key_length = Some(l);
    }

    info.key_setup_algo = Some(Algorithm::HmacSHA1);
    info.key_setup_param = 0;
    if t.tell() < params_end {
        let prf = algid::read_algo_id(t, AlgoClass::Mac)?;
        info.key_setup_algo = Some(prf.algorithm);
        info.key_setup_param = prf.size();
    }
    t!("PBKDF2 with {:?}, {} iterations, key length {:?}",
       info.key_setup_algo, iterations, key_length);

    check_end(t, params_end, start, "PBKDF2 parameters")?;
    check_end(t, end, start, "keyDerivationAlgorithm")?;
    Ok(key_length)
}

fn read_pwri(t: &mut Stream, start: usize, info: &mut QueryInfo)
             -> Result<()>
{
    let len = asn1::read_constructed(t, 3)?;
    let end = t.tell() + len;
    info.version = read_version(t, PWRI_VERSION, "PasswordRecipientInfo")?;

    let key_length = if asn1::peek_tag(t)? == asn1::ctag(0) {
        read_pbkdf2(t, start, info)?
    } else {
        None
    };

    // keyEncryptionAlgorithm
    asn1::read_sequence(t)?;
    let oid = asn1::read_oid(t)?;
    if oid != OID_PWRI_KEK {
        return Err(Error::NotAvailable(
            "Key wrap other than PWRI-KEK".into()).into());
    }
    let crypt = algid::read_crypt_algo_id(t)?;
    if let Some(l) = key_length {
        if l != crypt.key_size {
            return Err(bad_data!("PBKDF2 key length {} doesn't match the \
                                  {} byte {} key",
                                 l, crypt.key_size, crypt.algorithm));
        }
    }
    info.crypt_algo = Some(crypt.algorithm);
    info.crypt_mode = crypt.mode;
    info.key_size = crypt.key_size;
    info.iv = crypt.iv;

    let len = asn1::read_octet_string_hole(t, MIN_KEYSIZE)?;
    info.data = Span::new(t.tell() - start, len);
    t.skip(len)?;

    check_end(t, end, start, "PasswordRecipientInfo")
}

/// Reads a password-based RecipientInfo.
///
/// KEKRecipientInfo, which needs a pre-shared key, is recognized and
/// reported as `NotAvailable`.
pub(crate) fn read_kek(s: &mut Stream) -> Result<QueryInfo> {
    let mut t = s.clone();
    let start = t.tell();
    let mut info = QueryInfo::new(ObjectType::EncryptedKey);

    match asn1::peek_tag(&t)? {
        KEKRI_TAG => {
            let mut u = t.clone();
            asn1::read_constructed(&mut u, 2)?;
            read_version(&mut u, KEKRI_VERSION, "KEKRecipientInfo")?;
            return Err(Error::NotAvailable(
                "KEKRecipientInfo".into()).into());
        }
        PWRI_TAG => read_pwri(&mut t, start, &mut info)?,
        tag => return Err(bad_data!("Unexpected RecipientInfo tag {:#04x}",
                                    tag)),
    }

    info.size = t.tell() - start;
    *s = t;
    Ok(info)
}

/// Writes a PasswordRecipientInfo.
pub(crate) fn write_kek(o: &mut dyn io::Write, p: &KekParams) -> Result<()> {
    let (salt, iterations, prf, prf_param) = match p.key_setup {
        KeySetup::Pbkdf2 { salt, iterations, prf, prf_param } =>
            (salt, iterations, prf, prf_param),
        KeySetup::S2K(_) => return Err(Error::InvalidArgument(
            "PasswordRecipientInfo needs PBKDF2".into()).into()),
    };
    if salt.len() < MIN_SALT || salt.len() > MAX_SALT {
        return Err(Error::InvalidArgument(
            format!("Salt of {} bytes", salt.len())).into());
    }
    if p.encrypted_key.len() < MIN_KEYSIZE {
        return Err(Error::InvalidArgument(
            format!("Wrapped key of {} bytes", p.encrypted_key.len()))
                   .into());
    }

    let key_length = if p.key_size != p.crypt_algo.default_key_size()? {
        Some(p.key_size as u32)
    } else {
        None
    };
    let prf_id = if prf != Algorithm::HmacSHA1 {
        let size = if prf_param == 0 { Param::None }
                   else { Param::Size(prf_param) };
        Some(algid::write_algo_id(prf, size, Param::None)?)
    } else {
        None
    };
    let crypt_id = algid::write_crypt_algo_id(p.crypt_algo, p.mode,
                                              p.key_size, p.iv)?;

    let der = yasna::construct_der(|w| {
        w.write_tagged_implicit(yasna::Tag::context(3), |w| {
            w.write_sequence(|w| {
                w.next().write_u32(PWRI_VERSION as u32);
                w.next().write_tagged_implicit(yasna::Tag::context(0), |w| {
                    w.write_sequence(|w| {
                        w.next().write_der(OID_PBKDF2);
                        w.next().write_sequence(|w| {
                            w.next().write_bytes(salt);
                            w.next().write_u32(iterations);
                            if let Some(l) = key_length {
                                w.next().write_u32(l);
                            }
                            if let Some(id) = &prf_id {
                                w.next().write_der(id);
                            }
                        })
                    })
                });
                w.next().write_sequence(|w| {
                    w.next().write_der(OID_PWRI_KEK);
                    w.next().write_der(&crypt_id);
                });
                w.next().write_bytes(p.encrypted_key);
            })
        })
    });
    o.write_all(&der)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyex::{read_kek as read, read_keytrans, write_kek as write,
                       write_keytrans, KeyexFormat};
    use crate::types::CipherMode;

    const IANDS: &[u8] =
        &[0x30, 0x07, 0x30, 0x00, 0x02, 0x03, 0x01, 0x00, 0x01];

    fn kind(e: &anyhow::Error) -> Option<&Error> {
        e.downcast_ref::<Error>()
    }

    fn pwri<'a>(iv: &'a [u8], key_size: usize, prf: Algorithm,
                prf_param: usize, iterations: u32)
                -> KekParams<'a>
    {
        KekParams {
            crypt_algo: Algorithm::AES,
            key_size,
            mode: CipherMode::CBC,
            iv,
            key_setup: KeySetup::Pbkdf2 {
                salt: &[1, 2, 3, 4, 5, 6, 7, 8],
                iterations,
                prf,
                prf_param,
            },
            encrypted_key: &[0x77; 32],
        }
    }

    #[test]
    fn oaep() {
        let key = [0x11; 128];
        let p = KeyTransParams {
            pkc_algo: Algorithm::RSA,
            key_id: &[],
            iands: IANDS,
            encrypted_key: &key,
        };
        let blob = write_keytrans(KeyexFormat::CmsOaep, &p).unwrap();
        let info = read_keytrans(KeyexFormat::Cms, &blob).unwrap();
        assert_eq!(info.key_encoding, KeyEncoding::Oaep);
        assert_eq!(info.crypt_algo, Some(Algorithm::RSA));
        assert_eq!(info.data.slice(&blob).unwrap(), &key[..]);

        let blob = write_keytrans(KeyexFormat::Cms, &p).unwrap();
        let info = read_keytrans(KeyexFormat::Cms, &blob).unwrap();
        assert_eq!(info.key_encoding, KeyEncoding::Pkcs1);

        let p = KeyTransParams { pkc_algo: Algorithm::Elgamal, ..p };
        assert!(write_keytrans(KeyexFormat::CmsOaep, &p).is_err());
    }

    #[test]
    fn keytrans_versions() {
        let key = [0x11; 128];
        let p = KeyTransParams {
            pkc_algo: Algorithm::RSA,
            key_id: &[9; 8],
            iands: IANDS,
            encrypted_key: &key,
        };
        let cms = write_keytrans(KeyexFormat::Cms, &p).unwrap();
        let cryptlib = write_keytrans(KeyexFormat::Cryptlib, &p).unwrap();

        // Each reader insists on its own version.
        let e = read_keytrans(KeyexFormat::Cryptlib, &cms).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
        let e = read_keytrans(KeyexFormat::Cms, &cryptlib).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));

        // The encrypted key has a lower bound.
        let p = KeyTransParams { encrypted_key: &key[..64], ..p };
        assert!(write_keytrans(KeyexFormat::Cms, &p).is_err());
    }

    #[test]
    fn pwri_defaults() {
        let iv = [0; 16];
        // AES-128 and HMAC-SHA1 are the defaults and aren't written.
        let p = pwri(&iv, 16, Algorithm::HmacSHA1, 0, 1000);
        let short = write(KeyexFormat::Cms, &p).unwrap();
        let p = pwri(&iv, 32, Algorithm::HmacSHA2, 32, 1000);
        let long = write(KeyexFormat::Cms, &p).unwrap();
        assert!(long.len() > short.len() + 3 + 12);

        let info = read(KeyexFormat::Cms, &short).unwrap();
        assert_eq!(info.key_size, 16);
        assert_eq!(info.key_setup_algo, Some(Algorithm::HmacSHA1));
        let info = read(KeyexFormat::Cms, &long).unwrap();
        assert_eq!(info.key_size, 32);
        assert_eq!(info.key_setup_algo, Some(Algorithm::HmacSHA2));
        assert_eq!(info.key_setup_param, 32);
        assert_eq!(info.version, 0);

        // The KDF parameters are the [0] block.
        let kdf = info.kdf_params.slice(&long).unwrap();
        assert_eq!(kdf[0], 0xA0);
        assert_eq!(&kdf[2..2 + OID_PBKDF2.len()], OID_PBKDF2);
    }

    #[test]
    fn pwri_bounds() {
        let iv = [0; 16];
        let p = pwri(&iv, 16, Algorithm::HmacSHA1, 0, 20001);
        let blob = write(KeyexFormat::Cms, &p).unwrap();
        let e = read(KeyexFormat::Cms, &blob).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))), "{}", e);

        // Find the keyLength INTEGER and make it disagree with AES-256.
        let p = pwri(&iv, 32, Algorithm::HmacSHA1, 0, 1000);
        let blob = write(KeyexFormat::Cms, &p).unwrap();
        let at = blob.windows(3).position(|w| w == [0x02, 0x01, 32]).unwrap();
        let mut bad = blob.clone();
        bad[at + 2] = 24;
        let e = read(KeyexFormat::Cms, &bad).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))), "{}", e);
        bad[at + 2] = 8;
        let e = read(KeyexFormat::Cms, &bad).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))), "{}", e);

        // PGP's key setup can't be expressed.
        let mut p = pwri(&iv, 16, Algorithm::HmacSHA1, 0, 1000);
        p.key_setup = KeySetup::S2K(crate::crypto::S2K::Simple {
            hash: Algorithm::SHA1, hash_param: 0,
        });
        assert!(write(KeyexFormat::Cms, &p).is_err());
    }

    #[test]
    fn kekri() {
        // [2] { INTEGER 4, ... }
        let blob = [0xA2, 0x05, 0x02, 0x01, 0x04, 0x30, 0x00];
        let e = read(KeyexFormat::Cms, &blob).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::NotAvailable(_))));
        let blob = [0xA2, 0x05, 0x02, 0x01, 0x03, 0x30, 0x00];
        let e = read(KeyexFormat::Cms, &blob).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
        let e = read(KeyexFormat::Cms, &[0x30, 0x00]).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))));
    }

    #[test]
    fn trailing_data() {
        let iv = [0; 16];
        let blob = write(KeyexFormat::Cms, &pwri(&iv, 16, Algorithm::HmacSHA1,
                                                 0, 1000)).unwrap();
        // Grow the outer length and append a byte.
        assert!(blob[1] < 0x7F);
        let mut bad = blob.clone();
        bad[1] += 2;
        bad.extend_from_slice(&[0x05, 0x00]);
        let e = read(KeyexFormat::Cms, &bad).unwrap_err();
        assert!(matches!(kind(&e), Some(Error::BadData(_))), "{}", e);

        // A truncated object needs more data.
        let e = read(KeyexFormat::Cms, &blob[..blob.len() - 1]).unwrap_err();
        assert_eq!(kind(&e), Some(&Error::Underflow));
    }
}
