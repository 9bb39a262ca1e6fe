//! Algorithm, mode and content type enumerations.
//!
//! Algorithms are identified independently of any wire format.  The
//! PGP numbering is handled by [`pgp_to_algorithm`] and
//! [`algorithm_to_pgp`], the ASN.1 one by the [`algid`] module.
//!
//!   [`algid`]: crate::algid

use std::fmt;

#[cfg(test)]
use quickcheck::{Arbitrary, Gen};

use crate::Error;
use crate::Result;

/// Cryptographic algorithms.
///
/// The variants are ordered by class: conventional ciphers, public
/// key algorithms, hashes, MACs.  The ASN.1 tables rely on this
/// ordering.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
pub enum Algorithm {
    /// Single DES.
    DES,
    /// 3-DES in EDE configuration.
    TripleDES,
    /// IDEA block cipher.
    IDEA,
    /// CAST5/CAST128 block cipher.
    CAST,
    /// RC2 block cipher.
    RC2,
    /// RC4 stream cipher.
    RC4,
    /// AES, the key size is carried as a parameter.
    AES,
    /// Schneier et.al. Blowfish block cipher.
    Blowfish,
    /// Twofish block cipher.
    Twofish,

    /// Diffie-Hellman.
    DH,
    /// RSA.
    RSA,
    /// DSA.
    DSA,
    /// Elgamal encryption.
    Elgamal,
    /// ECDSA.
    ECDSA,
    /// ECDH.
    ECDH,

    /// MD5.
    MD5,
    /// SHA-1.
    SHA1,
    /// RIPEMD-160.
    RIPEMD160,
    /// SHA-2, the digest size is carried as a parameter.
    SHA2,

    /// HMAC-MD5.
    HmacMD5,
    /// HMAC-SHA1.
    HmacSHA1,
    /// HMAC-RIPEMD-160.
    HmacRIPEMD160,
    /// HMAC-SHA2, the digest size is carried as a parameter.
    HmacSHA2,
}

impl Algorithm {
    /// All algorithms, in order.
    pub const ALL: &'static [Algorithm] = &[
        Algorithm::DES, Algorithm::TripleDES, Algorithm::IDEA,
        Algorithm::CAST, Algorithm::RC2, Algorithm::RC4, Algorithm::AES,
        Algorithm::Blowfish, Algorithm::Twofish,
        Algorithm::DH, Algorithm::RSA, Algorithm::DSA, Algorithm::Elgamal,
        Algorithm::ECDSA, Algorithm::ECDH,
        Algorithm::MD5, Algorithm::SHA1, Algorithm::RIPEMD160,
        Algorithm::SHA2,
        Algorithm::HmacMD5, Algorithm::HmacSHA1, Algorithm::HmacRIPEMD160,
        Algorithm::HmacSHA2,
    ];

    /// Returns whether this is a conventional (symmetric) cipher.
    pub fn is_conventional(&self) -> bool {
        *self <= Algorithm::Twofish
    }

    /// Returns whether this is a public key algorithm.
    pub fn is_pkc(&self) -> bool {
        *self >= Algorithm::DH && *self <= Algorithm::ECDH
    }

    /// Returns whether this is a hash algorithm.
    pub fn is_hash(&self) -> bool {
        *self >= Algorithm::MD5 && *self <= Algorithm::SHA2
    }

    /// Returns whether this is a MAC algorithm.
    pub fn is_mac(&self) -> bool {
        *self >= Algorithm::HmacMD5
    }

    /// Returns whether this is a discrete-log public key algorithm.
    pub fn is_dlp(&self) -> bool {
        matches!(self, Algorithm::DH | Algorithm::DSA | Algorithm::Elgamal)
    }

    /// Returns whether this is an elliptic curve algorithm.
    pub fn is_ecc(&self) -> bool {
        matches!(self, Algorithm::ECDSA | Algorithm::ECDH)
    }

    /// Returns the block size of a conventional cipher.
    ///
    /// Stream ciphers have no block size, so RC4 is an error.
    pub fn block_size(&self) -> Result<usize> {
        use self::Algorithm::*;
        match self {
            DES | TripleDES | IDEA | CAST | RC2 | Blowfish => Ok(8),
            AES | Twofish => Ok(16),
            a => Err(Error::InvalidArgument(
                format!("{} is not a block cipher", a)).into()),
        }
    }

    /// Returns the default key size in bytes of a conventional
    /// cipher.
    pub fn default_key_size(&self) -> Result<usize> {
        use self::Algorithm::*;
        match self {
            DES => Ok(8),
            TripleDES => Ok(24),
            IDEA | CAST | RC2 | RC4 | AES | Blowfish => Ok(16),
            Twofish => Ok(32),
            a => Err(Error::InvalidArgument(
                format!("{} has no key size", a)).into()),
        }
    }

    /// Returns the digest size in bytes for a hash or MAC.
    ///
    /// For SHA-2 the digest size is the parameter, zero meaning
    /// SHA-256.
    pub fn digest_size(&self, param: usize) -> Result<usize> {
        use self::Algorithm::*;
        match self {
            MD5 | HmacMD5 => Ok(16),
            SHA1 | RIPEMD160 | HmacSHA1 | HmacRIPEMD160 => Ok(20),
            SHA2 | HmacSHA2 => match param {
                0 => Ok(32),
                28 | 32 | 48 | 64 => Ok(param),
                p => Err(Error::InvalidArgument(
                    format!("Invalid SHA-2 width {}", p)).into()),
            },
            a => Err(Error::InvalidArgument(
                format!("{} is not a hash", a)).into()),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Algorithm::*;
        f.write_str(match self {
            DES => "DES",
            TripleDES => "3DES",
            IDEA => "IDEA",
            CAST => "CAST-128",
            RC2 => "RC2",
            RC4 => "RC4",
            AES => "AES",
            Blowfish => "Blowfish",
            Twofish => "Twofish",
            DH => "Diffie-Hellman",
            RSA => "RSA",
            DSA => "DSA",
            Elgamal => "Elgamal",
            ECDSA => "ECDSA",
            ECDH => "ECDH",
            MD5 => "MD5",
            SHA1 => "SHA-1",
            RIPEMD160 => "RIPEMD-160",
            SHA2 => "SHA-2",
            HmacMD5 => "HMAC-MD5",
            HmacSHA1 => "HMAC-SHA1",
            HmacRIPEMD160 => "HMAC-RIPEMD-160",
            HmacSHA2 => "HMAC-SHA2",
        })
    }
}

#[cfg(test)]
impl Arbitrary for Algorithm {
    fn arbitrary(g: &mut Gen) -> Self {
        *g.choose(Algorithm::ALL).expect("non-empty")
    }
}

/// Block cipher modes.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, PartialOrd, Ord)]
pub enum CipherMode {
    /// No mode, used for stream ciphers and non-ciphers.
    None,
    /// Electronic code book.
    ECB,
    /// Cipher block chaining.
    CBC,
    /// Cipher feedback.
    CFB,
    /// Output feedback.
    OFB,
    /// Galois/counter mode.
    GCM,
}

impl Default for CipherMode {
    fn default() -> Self {
        CipherMode::None
    }
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The kind of content a de-enveloped layer holds.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug)]
pub enum ContentType {
    /// Plain data.
    Data,
    /// Signed data that has to be de-enveloped again.
    SignedData,
    /// Public-key encrypted data that has to be de-enveloped again.
    EnvelopedData,
    /// Conventionally encrypted data that has to be de-enveloped
    /// again.
    EncryptedData,
    /// Compressed data that has to be de-enveloped again.
    CompressedData,
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Data
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ContentType::Data => "data",
            ContentType::SignedData => "signed data",
            ContentType::EnvelopedData => "enveloped data",
            ContentType::EncryptedData => "encrypted data",
            ContentType::CompressedData => "compressed data",
        })
    }
}

/// What the outermost packet of an envelope does to its payload.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug)]
pub enum Usage {
    /// Nothing determined yet, or plain literal data.
    None,
    /// The payload is encrypted.
    Crypt,
    /// The payload is signed.
    Sign,
    /// The payload is compressed.
    Compress,
}

impl Default for Usage {
    fn default() -> Self {
        Usage::None
    }
}

/// Smallest conventional key we accept, in bytes.
pub const MIN_KEYSIZE: usize = 16;
/// Largest conventional key we work with, in bytes.
pub const MAX_WORKING_KEYSIZE: usize = 32;
/// Smallest RSA or DLP modulus we accept, in bytes.
pub const MIN_PKCSIZE: usize = 126;
/// Largest RSA or DLP modulus we accept, in bytes.
pub const MAX_PKCSIZE: usize = 512;
/// Smallest ECC field element we accept, in bytes.
pub const MIN_PKCSIZE_ECC: usize = 24;
/// Largest ECC field element we accept, in bytes.
pub const MAX_PKCSIZE_ECC: usize = 72;
/// Largest IV, in bytes.
pub const MAX_IVSIZE: usize = 32;
/// Largest digest, in bytes.
pub const MAX_HASHSIZE: usize = 64;
/// Upper bound on key derivation iterations in data we parse.
pub const MAX_KEYSETUP_ITERATIONS: u64 = 20000;

/// The class a PGP algorithm identifier belongs to.
///
/// PGP reuses small integers across classes, so the class selects
/// the table.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug)]
pub enum PgpAlgorithmClass {
    /// Session key ciphers.
    Crypt,
    /// Password-derived key ciphers.
    PasswordCrypt,
    /// Public key algorithms.
    Pkc,
    /// Hash algorithms.
    Hash,
}

// (PGP id, algorithm, parameter) per class.
const PGP_CRYPT: &[(u8, Algorithm, usize)] = &[
    (1, Algorithm::IDEA, 16),
    (2, Algorithm::TripleDES, 24),
    (3, Algorithm::CAST, 16),
    (4, Algorithm::Blowfish, 16),
    (7, Algorithm::AES, 16),
    (8, Algorithm::AES, 24),
    (9, Algorithm::AES, 32),
    (10, Algorithm::Twofish, 32),
];

const PGP_PKC: &[(u8, Algorithm, usize)] = &[
    (1, Algorithm::RSA, 0),
    // Encrypt-only and sign-only RSA.
    (2, Algorithm::RSA, 0),
    (3, Algorithm::RSA, 0),
    (16, Algorithm::Elgamal, 0),
    (17, Algorithm::DSA, 0),
    (18, Algorithm::ECDH, 0),
    (19, Algorithm::ECDSA, 0),
];

const PGP_HASH: &[(u8, Algorithm, usize)] = &[
    (1, Algorithm::MD5, 0),
    (2, Algorithm::SHA1, 0),
    (3, Algorithm::RIPEMD160, 0),
    (8, Algorithm::SHA2, 32),
    (9, Algorithm::SHA2, 48),
    (10, Algorithm::SHA2, 64),
    (11, Algorithm::SHA2, 28),
];

fn pgp_table(class: PgpAlgorithmClass) -> &'static [(u8, Algorithm, usize)] {
    match class {
        PgpAlgorithmClass::Crypt | PgpAlgorithmClass::PasswordCrypt =>
            PGP_CRYPT,
        PgpAlgorithmClass::Pkc => PGP_PKC,
        PgpAlgorithmClass::Hash => PGP_HASH,
    }
}

/// Maps a PGP algorithm identifier to an algorithm and parameter.
///
/// The parameter is the key size for ciphers and the digest size for
/// SHA-2.  Unknown identifiers are `NotAvailable`.
pub fn pgp_to_algorithm(id: u8, class: PgpAlgorithmClass)
                        -> Result<(Algorithm, usize)>
{
    pgp_table(class).iter()
        .find(|(i, _, _)| *i == id)
        .map(|(_, a, p)| (*a, *p))
        .ok_or_else(|| Error::NotAvailable(
            format!("PGP {:?} algorithm {}", class, id)).into())
}

/// Maps an algorithm and parameter to its PGP identifier.
///
/// A parameter of zero matches the first entry for the algorithm.
pub fn algorithm_to_pgp(algo: Algorithm, param: usize,
                        class: PgpAlgorithmClass)
                        -> Result<u8>
{
    pgp_table(class).iter()
        .find(|(_, a, p)| *a == algo && (param == 0 || *p == param))
        .map(|(i, _, _)| *i)
        .ok_or_else(|| Error::NotAvailable(
            format!("{} ({}) has no PGP {:?} identifier",
                    algo, param, class)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_are_disjoint() {
        for a in Algorithm::ALL {
            let n = [a.is_conventional(), a.is_pkc(), a.is_hash(), a.is_mac()]
                .iter().filter(|x| **x).count();
            assert_eq!(n, 1, "{:?}", a);
        }
    }

    #[test]
    fn pgp_ids() {
        assert_eq!(pgp_to_algorithm(9, PgpAlgorithmClass::Crypt).unwrap(),
                   (Algorithm::AES, 32));
        assert_eq!(pgp_to_algorithm(2, PgpAlgorithmClass::Hash).unwrap(),
                   (Algorithm::SHA1, 0));
        assert_eq!(algorithm_to_pgp(Algorithm::SHA2, 48,
                                    PgpAlgorithmClass::Hash).unwrap(),
                   9);
        assert_eq!(algorithm_to_pgp(Algorithm::RSA, 0,
                                    PgpAlgorithmClass::Pkc).unwrap(),
                   1);
        assert!(pgp_to_algorithm(5, PgpAlgorithmClass::Crypt).is_err());
        assert!(algorithm_to_pgp(Algorithm::RC4, 16,
                                 PgpAlgorithmClass::Crypt).is_err());
    }

    #[test]
    fn block_sizes() {
        assert_eq!(Algorithm::CAST.block_size().unwrap(), 8);
        assert_eq!(Algorithm::AES.block_size().unwrap(), 16);
        assert!(Algorithm::RC4.block_size().is_err());
        assert!(Algorithm::SHA1.block_size().is_err());
    }

    quickcheck! {
        fn pgp_crypt_roundtrip(id: u8) -> bool {
            match pgp_to_algorithm(id, PgpAlgorithmClass::Crypt) {
                Ok((a, p)) =>
                    algorithm_to_pgp(a, p, PgpAlgorithmClass::Crypt).unwrap()
                    == id,
                Err(_) => true,
            }
        }
    }
}
