//! ASN.1 algorithm identifiers.
//!
//! The OIDs used by X.509, CMS and cryptlib to identify algorithms
//! are kept in a static table.  Each entry maps an OID to an
//! algorithm and two parameters whose meaning depends on the class:
//!
//!   - hashes and MACs: the digest size (SHA-2 only),
//!   - signature algorithms: the hash algorithm and its digest size,
//!   - conventional ciphers: the mode and the key size.
//!
//! Entries for one algorithm are contiguous and start with the
//! canonical OID.  Many algorithms have several historic OIDs; all of
//! them decode, but only the first one in a run is ever written.
//!
//! Elliptic curves have their own table, see [`Curve`].

use std::fmt;

use crate::asn1;
use crate::Error;
use crate::Result;
use crate::stream::Stream;
use crate::types::{Algorithm, CipherMode};

/// The class of an algorithm identifier.
///
/// Several algorithms appear under more than one class: RSA is both
/// a public key algorithm (`rsaEncryption`) and part of a signature
/// algorithm (`sha256WithRSAEncryption`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlgoClass {
    /// Conventional encryption.
    Crypt,
    /// Hashing.
    Hash,
    /// Message authentication.
    Mac,
    /// Public key algorithms.
    Pkc,
    /// Signature algorithms, a public key algorithm plus a hash.
    PkcSig,
}

/// An algorithm identifier parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Param {
    /// Unused, or "any" in a lookup.
    None,
    /// A size in bytes.
    Size(usize),
    /// A hash algorithm.
    Hash(Algorithm),
    /// A cipher mode.
    Mode(CipherMode),
}

impl Default for Param {
    fn default() -> Self {
        Param::None
    }
}

/// A decoded algorithm identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AlgoId {
    /// The algorithm.
    pub algorithm: Algorithm,
    /// The first parameter.
    pub param1: Param,
    /// The second parameter.
    pub param2: Param,
}

impl AlgoId {
    /// Returns the hash parameters of a signature algorithm.
    pub fn hash(&self) -> Option<(Algorithm, usize)> {
        match (self.param1, self.param2) {
            (Param::Hash(h), Param::Size(s)) => Some((h, s)),
            (Param::Hash(h), _) => Some((h, 0)),
            _ => None,
        }
    }

    /// Returns the size parameter, if any.
    pub fn size(&self) -> usize {
        match (self.param1, self.param2) {
            (Param::Size(s), _) | (_, Param::Size(s)) => s,
            _ => 0,
        }
    }
}

impl fmt::Display for AlgoId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.algorithm)?;
        for p in [self.param1, self.param2].iter() {
            match p {
                Param::None => (),
                Param::Size(s) => write!(f, "/{}", s)?,
                Param::Hash(h) => write!(f, "/{}", h)?,
                Param::Mode(m) => write!(f, "/{}", m)?,
            }
        }
        Ok(())
    }
}

struct AlgoIdInfo {
    algorithm: Algorithm,
    param1: Param,
    param2: Param,
    class: AlgoClass,
    oid: &'static [u8],
}

macro_rules! entry {
    ( $algo:ident, $p1:expr, $p2:expr, $class:ident, [ $($b:expr),* ] ) => {
        AlgoIdInfo {
            algorithm: Algorithm::$algo,
            param1: $p1,
            param2: $p2,
            class: AlgoClass::$class,
            oid: &[ $($b),* ],
        }
    };
}

use self::Param::{Hash as H, Mode as M, None as N, Size as S};
use crate::types::CipherMode::{CBC, CFB, ECB, GCM, OFB};

const ALGO_ID_TABLE: &[AlgoIdInfo] = &[
    // desECB, desCBC, desCFB, desOFB (OIW).
    entry!(DES, M(ECB), S(8), Crypt,
           [0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x06]),
    entry!(DES, M(CBC), S(8), Crypt,
           [0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x07]),
    entry!(DES, M(CFB), S(8), Crypt,
           [0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x09]),
    entry!(DES, M(OFB), S(8), Crypt,
           [0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x08]),
    // des-ede3-cbc (1 2 840 113549 3 7).
    entry!(TripleDES, M(CBC), S(24), Crypt,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x03, 0x07]),
    // IDEA (Ascom Tech, 1 3 6 1 4 1 188 7 1 1 x).
    entry!(IDEA, M(ECB), S(16), Crypt,
           [0x06, 0x0B, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x81, 0x3C, 0x07,
            0x01, 0x01, 0x01]),
    entry!(IDEA, M(CBC), S(16), Crypt,
           [0x06, 0x0B, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x81, 0x3C, 0x07,
            0x01, 0x01, 0x02]),
    entry!(IDEA, M(CFB), S(16), Crypt,
           [0x06, 0x0B, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x81, 0x3C, 0x07,
            0x01, 0x01, 0x03]),
    entry!(IDEA, M(OFB), S(16), Crypt,
           [0x06, 0x0B, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x81, 0x3C, 0x07,
            0x01, 0x01, 0x04]),
    // cast5CBC (1 2 840 113533 7 66 10).
    entry!(CAST, M(CBC), S(16), Crypt,
           [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF6, 0x7D, 0x07, 0x42,
            0x0A]),
    // rc2CBC (1 2 840 113549 3 2).
    entry!(RC2, M(CBC), S(16), Crypt,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x03, 0x02]),
    // rc4 (1 2 840 113549 3 4).
    entry!(RC4, M(CipherMode::None), S(16), Crypt,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x03, 0x04]),
    // AES (NIST, 2 16 840 1 101 3 4 1 x).
    entry!(AES, M(ECB), S(16), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x01]),
    entry!(AES, M(ECB), S(24), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x15]),
    entry!(AES, M(ECB), S(32), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x29]),
    entry!(AES, M(CBC), S(16), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x02]),
    entry!(AES, M(CBC), S(24), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x16]),
    entry!(AES, M(CBC), S(32), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x2A]),
    entry!(AES, M(CFB), S(16), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x04]),
    entry!(AES, M(CFB), S(24), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x18]),
    entry!(AES, M(CFB), S(32), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x2C]),
    entry!(AES, M(OFB), S(16), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x03]),
    entry!(AES, M(OFB), S(24), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x17]),
    entry!(AES, M(OFB), S(32), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x2B]),
    entry!(AES, M(GCM), S(16), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x06]),
    entry!(AES, M(GCM), S(24), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x1A]),
    entry!(AES, M(GCM), S(32), Crypt,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x2E]),
    // Blowfish (cryptlib arc, 1 3 6 1 4 1 3029 1 1 x).
    entry!(Blowfish, M(ECB), S(16), Crypt,
           [0x06, 0x0A, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x01,
            0x01]),
    entry!(Blowfish, M(CBC), S(16), Crypt,
           [0x06, 0x0A, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x01,
            0x02]),

    // dhPublicNumber (1 2 840 10046 2 1).
    entry!(DH, N, N, Pkc,
           [0x06, 0x07, 0x2A, 0x86, 0x48, 0xCE, 0x3E, 0x02, 0x01]),
    // rsaEncryption (1 2 840 113549 1 1 1), then X.500's rsa.
    entry!(RSA, N, N, Pkc,
           [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01]),
    entry!(RSA, N, N, Pkc,
           [0x06, 0x04, 0x55, 0x08, 0x01, 0x01]),
    // md5WithRSAEncryption.
    entry!(RSA, H(Algorithm::MD5), N, PkcSig,
           [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x04]),
    // sha1WithRSAEncryption, then OIW's sha1WithRSASignature.
    entry!(RSA, H(Algorithm::SHA1), N, PkcSig,
           [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x05]),
    entry!(RSA, H(Algorithm::SHA1), N, PkcSig,
           [0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x1D]),
    // ripemd160WithRSA (TeleTrusT).
    entry!(RSA, H(Algorithm::RIPEMD160), N, PkcSig,
           [0x06, 0x06, 0x2B, 0x24, 0x03, 0x03, 0x01, 0x02]),
    // sha{256,384,512,224}WithRSAEncryption.
    entry!(RSA, H(Algorithm::SHA2), S(32), PkcSig,
           [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B]),
    entry!(RSA, H(Algorithm::SHA2), S(48), PkcSig,
           [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0C]),
    entry!(RSA, H(Algorithm::SHA2), S(64), PkcSig,
           [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0D]),
    entry!(RSA, H(Algorithm::SHA2), S(28), PkcSig,
           [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0E]),
    // id-dsa (X9.57), then OIW's dsa.
    entry!(DSA, N, N, Pkc,
           [0x06, 0x07, 0x2A, 0x86, 0x48, 0xCE, 0x38, 0x04, 0x01]),
    entry!(DSA, N, N, Pkc,
           [0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x0C]),
    // id-dsa-with-sha1, then OIW's dsaWithSHA1.
    entry!(DSA, H(Algorithm::SHA1), N, PkcSig,
           [0x06, 0x07, 0x2A, 0x86, 0x48, 0xCE, 0x38, 0x04, 0x03]),
    entry!(DSA, H(Algorithm::SHA1), N, PkcSig,
           [0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x1B]),
    // id-dsa-with-sha256 (NIST).
    entry!(DSA, H(Algorithm::SHA2), S(32), PkcSig,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x03, 0x02]),
    // elgamal (cryptlib arc).
    entry!(Elgamal, N, N, Pkc,
           [0x06, 0x0A, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x02,
            0x01]),
    // id-ecPublicKey (X9.62).
    entry!(ECDSA, N, N, Pkc,
           [0x06, 0x07, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x02, 0x01]),
    // ecdsa-with-SHA1, ecdsa-with-SHA{256,384,512,224}.
    entry!(ECDSA, H(Algorithm::SHA1), N, PkcSig,
           [0x06, 0x07, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x01]),
    entry!(ECDSA, H(Algorithm::SHA2), S(32), PkcSig,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x02]),
    entry!(ECDSA, H(Algorithm::SHA2), S(48), PkcSig,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x03]),
    entry!(ECDSA, H(Algorithm::SHA2), S(64), PkcSig,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x04]),
    entry!(ECDSA, H(Algorithm::SHA2), S(28), PkcSig,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x04, 0x03, 0x01]),

    // md5 (RSADSI).
    entry!(MD5, N, N, Hash,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x05]),
    // sha1 (OIW).
    entry!(SHA1, N, N, Hash,
           [0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x1A]),
    // ripemd160 (TeleTrusT).
    entry!(RIPEMD160, N, N, Hash,
           [0x06, 0x05, 0x2B, 0x24, 0x03, 0x02, 0x01]),
    // sha256, sha384, sha512, sha224 (NIST).
    entry!(SHA2, S(32), N, Hash,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01]),
    entry!(SHA2, S(48), N, Hash,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02]),
    entry!(SHA2, S(64), N, Hash,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03]),
    entry!(SHA2, S(28), N, Hash,
           [0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x04]),

    // hmac-MD5 (IPsec).
    entry!(HmacMD5, N, N, Mac,
           [0x06, 0x08, 0x2B, 0x06, 0x01, 0x05, 0x05, 0x08, 0x01, 0x01]),
    // hmacWithSHA1 (RSADSI), then hmac-SHA (IPsec).
    entry!(HmacSHA1, N, N, Mac,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x07]),
    entry!(HmacSHA1, N, N, Mac,
           [0x06, 0x08, 0x2B, 0x06, 0x01, 0x05, 0x05, 0x08, 0x01, 0x02]),
    // hmac-RIPEMD-160 (IPsec).
    entry!(HmacRIPEMD160, N, N, Mac,
           [0x06, 0x08, 0x2B, 0x06, 0x01, 0x05, 0x05, 0x08, 0x01, 0x04]),
    // hmacWithSHA{256,384,512,224} (RSADSI).
    entry!(HmacSHA2, S(32), N, Mac,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x09]),
    entry!(HmacSHA2, S(48), N, Mac,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x0A]),
    entry!(HmacSHA2, S(64), N, Mac,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x0B]),
    entry!(HmacSHA2, S(28), N, Mac,
           [0x06, 0x08, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x02, 0x08]),
];

/// Maps an encoded OID to an algorithm.
///
/// Only entries of the given class are considered.  Fails with
/// `NotAvailable` if the OID is unknown.
pub fn oid_to_algorithm(oid: &[u8], class: AlgoClass) -> Result<AlgoId> {
    if oid.len() < 3 {
        return Err(Error::BadData("Truncated OID".into()).into());
    }
    // The final arc is what usually tells related OIDs apart, so it
    // makes for a cheap first comparison.
    let last = oid[oid.len() - 1];
    ALGO_ID_TABLE.iter()
        .filter(|e| e.class == class)
        .find(|e| e.oid.len() == oid.len()
              && e.oid[e.oid.len() - 1] == last
              && e.oid == oid)
        .map(|e| AlgoId {
            algorithm: e.algorithm,
            param1: e.param1,
            param2: e.param2,
        })
        .ok_or_else(|| Error::NotAvailable(
            format!("Unknown {:?} algorithm OID", class)).into())
}

/// Returns the canonical OID for an algorithm.
///
/// `Param::None` matches anything, yielding the first, canonical
/// entry.  If `strict` is set, a failed lookup is logged since it
/// means a caller asked for something it should know can't be
/// encoded; otherwise the failure is silent, which suits capability
/// probing.  Either way the result is `NotAvailable`.
pub fn algorithm_to_oid(algorithm: Algorithm, param1: Param, param2: Param,
                        strict: bool)
                        -> Result<&'static [u8]>
{
    let run = ALGO_ID_TABLE.iter()
        .skip_while(|e| e.algorithm != algorithm)
        .take_while(|e| e.algorithm == algorithm);
    let found = run
        .filter(|e| param1 == Param::None || e.param1 == param1)
        .find(|e| param2 == Param::None || e.param2 == param2);

    match found {
        Some(e) => Ok(e.oid),
        None => {
            if strict {
                log::warn!("No OID for {} with {:?}, {:?}",
                           algorithm, param1, param2);
            }
            Err(Error::NotAvailable(
                format!("No OID for {} with {:?}, {:?}",
                        algorithm, param1, param2)).into())
        }
    }
}

/// Reads an AlgorithmIdentifier whose parameters must be absent or
/// NULL.
pub fn read_algo_id(s: &mut Stream, class: AlgoClass) -> Result<AlgoId> {
    let mut t = s.clone();
    let (id, extra) = read_algo_id_ex(&mut t, class)?;
    if extra > 0 {
        return Err(Error::BadData(
            format!("Unexpected {} bytes of parameters for {}", extra, id))
                   .into());
    }
    *s = t;
    Ok(id)
}

/// Reads an AlgorithmIdentifier that may carry parameters.
///
/// A NULL parameter is consumed.  Otherwise the stream is left at the
/// parameters and their length is returned for the caller to parse.
pub fn read_algo_id_ex(s: &mut Stream, class: AlgoClass)
                       -> Result<(AlgoId, usize)>
{
    let mut t = s.clone();
    let len = asn1::read_sequence(&mut t)?;
    let start = t.tell();
    let oid = asn1::read_oid(&mut t)?;
    let id = oid_to_algorithm(oid, class)?;
    let used = t.tell() - start;
    if used > len {
        return Err(Error::BadData("AlgorithmIdentifier overrun".into()).into());
    }
    let mut extra = len - used;
    if extra == 2 && asn1::peek_tag(&t)? == asn1::BER_NULL {
        asn1::read_null(&mut t)?;
        extra = 0;
    }
    *s = t;
    Ok((id, extra))
}

/// Reads an AlgorithmIdentifier of one of two classes.
pub fn read_algo_id_either(s: &mut Stream, first: AlgoClass,
                           second: AlgoClass)
                           -> Result<(AlgoId, AlgoClass)>
{
    let mut t = s.clone();
    match read_algo_id(&mut t, first) {
        Ok(id) => {
            *s = t;
            Ok((id, first))
        }
        Err(e) => match e.downcast_ref::<Error>() {
            Some(Error::NotAvailable(_)) =>
                read_algo_id(s, second).map(|id| (id, second)),
            _ => Err(e),
        },
    }
}

// Hashes, RSA and RSA signatures carry an explicit NULL; DSA and
// ECDSA signature identifiers have no parameters at all.
fn takes_null(algorithm: Algorithm, param1: Param) -> bool {
    match algorithm {
        Algorithm::RSA => true,
        Algorithm::DSA | Algorithm::ECDSA | Algorithm::DH
            | Algorithm::Elgamal | Algorithm::ECDH => false,
        _ => param1 == Param::None || ! matches!(param1, Param::Hash(_)),
    }
}

/// Writes an AlgorithmIdentifier without algorithm-specific
/// parameters.
pub fn write_algo_id(algorithm: Algorithm, param1: Param, param2: Param)
                     -> Result<Vec<u8>>
{
    let oid = algorithm_to_oid(algorithm, param1, param2, true)?;
    let null = takes_null(algorithm, param1);
    Ok(yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next().write_der(oid);
            if null {
                w.next().write_null();
            }
        })
    }))
}

/// A decoded conventional encryption AlgorithmIdentifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CryptAlgoId {
    /// The cipher.
    pub algorithm: Algorithm,
    /// The mode.
    pub mode: CipherMode,
    /// The key size in bytes.
    pub key_size: usize,
    /// The IV or nonce, if any.
    pub iv: Vec<u8>,
}

/// Reads a conventional encryption AlgorithmIdentifier including its
/// IV parameters.
pub fn read_crypt_algo_id(s: &mut Stream) -> Result<CryptAlgoId> {
    let mut t = s.clone();
    let (id, extra) = read_algo_id_ex(&mut t, AlgoClass::Crypt)?;
    let mode = match id.param1 {
        Param::Mode(m) => m,
        _ => CipherMode::None,
    };
    let mut key_size = id.size();
    let mut iv = Vec::new();

    if extra > 0 {
        let mut p = t.sub_stream(extra)?;
        match asn1::peek_tag(&p)? {
            asn1::BER_OCTETSTRING => {
                iv = asn1::read_octet_string(&mut p, 8, 32)?.to_vec();
            }
            asn1::BER_SEQUENCE => {
                let len = asn1::read_sequence(&mut p)?;
                let mut q = p.sub_stream(len)?;
                while q.remaining() > 0 {
                    match asn1::peek_tag(&q)? {
                        asn1::BER_OCTETSTRING if iv.is_empty() =>
                            iv = asn1::read_octet_string(&mut q, 8, 32)?
                                .to_vec(),
                        asn1::BER_INTEGER => {
                            // CAST's key length is in bits.
                            let v = asn1::read_short_integer(&mut q)? as usize;
                            if id.algorithm == Algorithm::CAST {
                                key_size = v / 8;
                            }
                        }
                        _ => asn1::read_universal(&mut q)?,
                    }
                }
            }
            _ => asn1::read_universal(&mut p)?,
        }
        if p.remaining() > 0 {
            return Err(Error::BadData(
                "Trailing data in cipher parameters".into()).into());
        }
    }

    match mode {
        CipherMode::CBC | CipherMode::CFB | CipherMode::OFB => {
            if iv.len() != id.algorithm.block_size()? {
                return Err(Error::BadData(
                    format!("{} IV of {} bytes", id.algorithm, iv.len()))
                           .into());
            }
        }
        CipherMode::GCM => {
            if iv.len() < 12 {
                return Err(Error::BadData(
                    format!("GCM nonce of {} bytes", iv.len())).into());
            }
        }
        CipherMode::ECB | CipherMode::None => (),
    }
    if key_size == 0 {
        key_size = id.algorithm.default_key_size()?;
    }

    *s = t;
    Ok(CryptAlgoId { algorithm: id.algorithm, mode, key_size, iv })
}

/// Writes a conventional encryption AlgorithmIdentifier.
pub fn write_crypt_algo_id(algorithm: Algorithm, mode: CipherMode,
                           key_size: usize, iv: &[u8])
                           -> Result<Vec<u8>>
{
    let size = if algorithm == Algorithm::AES {
        Param::Size(key_size)
    } else {
        Param::None
    };
    let oid = algorithm_to_oid(algorithm, Param::Mode(mode), size, true)?;

    Ok(yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next().write_der(oid);
            match mode {
                CipherMode::ECB | CipherMode::None => (),
                CipherMode::GCM => w.next().write_sequence(|w| {
                    w.next().write_bytes(iv);
                }),
                _ if algorithm == Algorithm::CAST =>
                    w.next().write_sequence(|w| {
                        w.next().write_bytes(iv);
                        w.next().write_u32(key_size as u32 * 8);
                    }),
                _ => w.next().write_bytes(iv),
            }
        })
    }))
}

/// Named elliptic curves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Curve {
    /// NIST P-256.
    P256,
    /// NIST P-384.
    P384,
    /// NIST P-521.
    P521,
    /// brainpoolP256r1.
    Brainpool256,
    /// brainpoolP384r1.
    Brainpool384,
    /// brainpoolP512r1.
    Brainpool512,
}

const CURVE_TABLE: &[(Curve, usize, &[u8])] = &[
    (Curve::P256, 32,
     &[0x06, 0x08, 0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07]),
    (Curve::P384, 48, &[0x06, 0x05, 0x2B, 0x81, 0x04, 0x00, 0x22]),
    (Curve::P521, 66, &[0x06, 0x05, 0x2B, 0x81, 0x04, 0x00, 0x23]),
    (Curve::Brainpool256, 32,
     &[0x06, 0x09, 0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x07]),
    (Curve::Brainpool384, 48,
     &[0x06, 0x09, 0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0B]),
    (Curve::Brainpool512, 64,
     &[0x06, 0x09, 0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x0D]),
];

impl Curve {
    /// Returns the size of the curve's field elements in bytes.
    pub fn field_size(&self) -> usize {
        CURVE_TABLE.iter().find(|(c, _, _)| c == self)
            .map(|(_, s, _)| *s).unwrap_or(0)
    }

    /// Returns the curve's encoded OID.
    pub fn oid(&self) -> &'static [u8] {
        CURVE_TABLE.iter().find(|(c, _, _)| c == self)
            .map(|(_, _, o)| *o).unwrap_or(&[])
    }

    /// Maps an encoded OID to a curve.
    pub fn from_oid(oid: &[u8]) -> Result<Curve> {
        CURVE_TABLE.iter().find(|(_, _, o)| *o == oid)
            .map(|(c, _, _)| *c)
            .ok_or_else(|| Error::NotAvailable("Unknown curve OID".into())
                        .into())
    }
}

/// Reads a named curve OID.
pub fn read_ecc_oid(s: &mut Stream) -> Result<Curve> {
    let mut t = s.clone();
    let c = Curve::from_oid(asn1::read_oid(&mut t)?)?;
    *s = t;
    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_grouped() {
        // Algorithms appear in ascending order, so each one's entries
        // are contiguous.
        for w in ALGO_ID_TABLE.windows(2) {
            assert!(w[0].algorithm <= w[1].algorithm,
                    "{:?} before {:?}", w[0].algorithm, w[1].algorithm);
        }
        for e in ALGO_ID_TABLE {
            assert_eq!(e.oid[0], asn1::BER_OBJECT_IDENTIFIER);
            assert_eq!(e.oid[1] as usize, e.oid.len() - 2);
        }
    }

    #[test]
    fn totality() {
        // Every entry decodes, and the canonical entry for the decoded
        // parameters encodes to an OID that decodes the same way.
        for e in ALGO_ID_TABLE {
            let id = oid_to_algorithm(e.oid, e.class).unwrap();
            assert_eq!((id.algorithm, id.param1, id.param2),
                       (e.algorithm, e.param1, e.param2));
            let canonical = algorithm_to_oid(id.algorithm, id.param1,
                                             id.param2, true).unwrap();
            assert_eq!(oid_to_algorithm(canonical, e.class).unwrap(), id);
        }
    }

    #[test]
    fn legacy_oids() {
        // OIW's sha1WithRSASignature decodes like the RSADSI OID but
        // is never written.
        let oiw = [0x06, 0x05, 0x2B, 0x0E, 0x03, 0x02, 0x1D];
        let rsadsi = [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D,
                      0x01, 0x01, 0x05];
        let a = oid_to_algorithm(&oiw, AlgoClass::PkcSig).unwrap();
        let b = oid_to_algorithm(&rsadsi, AlgoClass::PkcSig).unwrap();
        assert_eq!(a, b);
        assert_eq!(algorithm_to_oid(a.algorithm, a.param1, a.param2, true)
                   .unwrap(), &rsadsi[..]);

        let x500 = [0x06, 0x04, 0x55, 0x08, 0x01, 0x01];
        assert_eq!(oid_to_algorithm(&x500, AlgoClass::Pkc).unwrap().algorithm,
                   Algorithm::RSA);
    }

    #[test]
    fn class_filter() {
        let sha256 = algorithm_to_oid(Algorithm::SHA2, Param::Size(32),
                                      Param::None, true).unwrap();
        assert!(oid_to_algorithm(sha256, AlgoClass::Hash).is_ok());
        let e = oid_to_algorithm(sha256, AlgoClass::Crypt).unwrap_err();
        assert!(matches!(e.downcast_ref::<Error>(),
                         Some(Error::NotAvailable(_))));
    }

    #[test]
    fn wildcards_pick_canonical() {
        let oid = algorithm_to_oid(Algorithm::SHA2, Param::None, Param::None,
                                   false).unwrap();
        assert_eq!(oid_to_algorithm(oid, AlgoClass::Hash).unwrap().param1,
                   Param::Size(32));
        let oid = algorithm_to_oid(Algorithm::RSA, Param::None, Param::None,
                                   false).unwrap();
        assert_eq!(oid_to_algorithm(oid, AlgoClass::Pkc).unwrap().algorithm,
                   Algorithm::RSA);
        assert!(algorithm_to_oid(Algorithm::Twofish, Param::None,
                                 Param::None, false).is_err());
        assert!(algorithm_to_oid(Algorithm::SHA2, Param::Size(40),
                                 Param::None, false).is_err());
    }

    #[test]
    fn algo_id_roundtrip() {
        let cases = [
            (Algorithm::SHA1, Param::None, Param::None, AlgoClass::Hash),
            (Algorithm::SHA2, Param::Size(64), Param::None, AlgoClass::Hash),
            (Algorithm::RSA, Param::None, Param::None, AlgoClass::Pkc),
            (Algorithm::RSA, Param::Hash(Algorithm::SHA2), Param::Size(32),
             AlgoClass::PkcSig),
            (Algorithm::DSA, Param::Hash(Algorithm::SHA1), Param::None,
             AlgoClass::PkcSig),
            (Algorithm::ECDSA, Param::Hash(Algorithm::SHA2), Param::Size(48),
             AlgoClass::PkcSig),
        ];
        for (a, p1, p2, class) in cases.iter() {
            let der = write_algo_id(*a, *p1, *p2).unwrap();
            let mut s = Stream::new(&der);
            let id = read_algo_id(&mut s, *class).unwrap();
            assert_eq!((id.algorithm, id.param1, id.param2), (*a, *p1, *p2));
            assert_eq!(s.remaining(), 0);
        }
    }

    #[test]
    fn unexpected_parameters() {
        let der = write_crypt_algo_id(Algorithm::AES, CipherMode::CBC, 16,
                                      &[7; 16]).unwrap();
        assert!(read_algo_id(&mut Stream::new(&der), AlgoClass::Crypt)
                .is_err());
        let (id, extra) = read_algo_id_ex(&mut Stream::new(&der),
                                          AlgoClass::Crypt).unwrap();
        assert_eq!(id.algorithm, Algorithm::AES);
        assert_eq!(extra, 18);
    }

    #[test]
    fn null_parameters() {
        let der = write_algo_id(Algorithm::SHA1, Param::None, Param::None)
            .unwrap();
        assert_eq!(&der[der.len() - 2..], &[asn1::BER_NULL, 0]);
        let (_, extra) = read_algo_id_ex(&mut Stream::new(&der),
                                         AlgoClass::Hash).unwrap();
        assert_eq!(extra, 0);

        // Two bytes of something else are left for the caller.
        let mut other = der.clone();
        let n = other.len();
        other[n - 2] = 0x04;
        let mut s = Stream::new(&other);
        let (_, extra) = read_algo_id_ex(&mut s, AlgoClass::Hash).unwrap();
        assert_eq!(extra, 2);
        assert_eq!(s.rest(), &[0x04, 0]);
    }

    #[test]
    fn crypt_algo_ids() {
        for &(a, m, k, ivlen) in &[
            (Algorithm::AES, CipherMode::CBC, 16, 16),
            (Algorithm::AES, CipherMode::CFB, 32, 16),
            (Algorithm::AES, CipherMode::GCM, 24, 12),
            (Algorithm::TripleDES, CipherMode::CBC, 24, 8),
            (Algorithm::CAST, CipherMode::CBC, 16, 8),
            (Algorithm::IDEA, CipherMode::OFB, 16, 8),
            (Algorithm::DES, CipherMode::ECB, 8, 0),
        ] {
            let iv = vec![0x5A; ivlen];
            let der = write_crypt_algo_id(a, m, k, &iv).unwrap();
            let c = read_crypt_algo_id(&mut Stream::new(&der)).unwrap();
            assert_eq!(c, CryptAlgoId { algorithm: a, mode: m, key_size: k,
                                        iv: iv.clone() });
        }

        // Wrong IV size.
        let der = write_crypt_algo_id(Algorithm::AES, CipherMode::CBC, 16,
                                      &[1; 8]).unwrap();
        assert!(read_crypt_algo_id(&mut Stream::new(&der)).is_err());
    }

    #[test]
    fn curves() {
        for c in &[Curve::P256, Curve::P384, Curve::P521,
                   Curve::Brainpool256, Curve::Brainpool384,
                   Curve::Brainpool512] {
            assert_eq!(Curve::from_oid(c.oid()).unwrap(), *c);
            assert!(c.field_size() >= 32);
            let mut s = Stream::new(c.oid());
            assert_eq!(read_ecc_oid(&mut s).unwrap(), *c);
        }
        assert!(Curve::from_oid(&[0x06, 0x01, 0x00]).is_err());
    }
}
