//! Password based key derivation for PGP.
//!
//! An SKE packet names the hash, salt and work factor that turn the
//! user's password into a key encryption key.  PGP 2 conventional
//! encryption uses an unsalted MD5 hash of the password.  See
//! [Section 3.7 of RFC 4880].
//!
//!   [Section 3.7 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-3.7

use std::fmt;
use std::io;

use crate::Error;
use crate::Outcome;
use crate::Result;
use crate::crypto::SessionKey;
use crate::packet::SALT_SIZE;
use crate::serialize::{Serialize, write_byte};
use crate::stream::Stream;
use crate::types::{
    Algorithm,
    PgpAlgorithmClass,
    algorithm_to_pgp,
    pgp_to_algorithm,
};

/// The GNU extension used for keys whose secret is stored elsewhere.
const S2K_GNU_DUMMY: u8 = 101;

/// How a password is turned into a key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum S2K {
    /// One hash of the password.  Rejected in SKE packets.
    Simple {
        /// The hash.
        hash: Algorithm,
        /// Digest size for parametrised hashes.
        hash_param: usize,
    },
    /// One hash of the salt and password.
    Salted {
        /// The hash.
        hash: Algorithm,
        /// Digest size for parametrised hashes.
        hash_param: usize,
        /// Eight bytes of public salt.
        salt: [u8; SALT_SIZE],
    },
    /// The salt and password, repeated until `hash_bytes` bytes
    /// have been hashed.
    Iterated {
        /// The hash.
        hash: Algorithm,
        /// Digest size for parametrised hashes.
        hash_param: usize,
        /// Eight bytes of public salt.
        salt: [u8; SALT_SIZE],
        /// Total number of bytes fed to the hash.
        hash_bytes: u32,
    },
}

impl Default for S2K {
    fn default() -> Self {
        let mut salt = [0u8; SALT_SIZE];
        crate::crypto::random(&mut salt);
        S2K::Iterated {
            hash: Algorithm::SHA2,
            hash_param: 32,
            salt,
            hash_bytes: S2K::decode_count(0xC0),
        }
    }
}

impl S2K {
    /// Returns the hash algorithm and its parameter.
    pub fn hash(&self) -> (Algorithm, usize) {
        match self {
            S2K::Simple { hash, hash_param }
            | S2K::Salted { hash, hash_param, .. }
            | S2K::Iterated { hash, hash_param, .. } => (*hash, *hash_param),
        }
    }

    /// Returns the salt, if any.
    pub fn salt(&self) -> Option<&[u8]> {
        match self {
            S2K::Simple { .. } => None,
            S2K::Salted { salt, .. } | S2K::Iterated { salt, .. } =>
                Some(&salt[..]),
        }
    }

    /// Returns the number of bytes hashed.
    pub fn hash_bytes(&self) -> Option<u32> {
        match self {
            S2K::Iterated { hash_bytes, .. } => Some(*hash_bytes),
            _ => None,
        }
    }

    /// Convert the string to a key using the S2K's parameters.
    pub fn derive_key(&self, string: &[u8], key_size: usize)
                      -> Result<SessionKey> {
        let (hash, hash_param) = self.hash();
        let mut hash = hash.context(hash_param)?;

        // If the digest length is shorter than the key length, then
        // we need to concatenate multiple hashes, each preloaded with
        // i 0s.
        let hash_sz = hash.digest_size();
        let num_contexts = (key_size + hash_sz - 1) / hash_sz;
        let mut zeros = Vec::with_capacity(num_contexts + 1);
        let mut ret: SessionKey = vec![0u8; key_size].into();

        for data in ret.chunks_mut(hash_sz) {
            hash.update(&zeros[..]);

            match self {
                S2K::Simple { .. } => {
                    hash.update(string);
                }
                S2K::Salted { salt, .. } => {
                    hash.update(salt);
                    hash.update(string);
                }
                S2K::Iterated { salt, hash_bytes, .. }
                if (*hash_bytes as usize) < salt.len() + string.len() =>
                {
                    // Independent of what the hash count is, we
                    // always hash the whole salt and password once.
                    hash.update(salt);
                    hash.update(string);
                },
                S2K::Iterated { salt, hash_bytes, .. } => {
                    // Unroll the processing loop N times.
                    const N: usize = 16;
                    let data_len = salt.len() + string.len();
                    let octs_per_iter = N * data_len;
                    let mut block: SessionKey =
                        vec![0u8; octs_per_iter].into();
                    let full = *hash_bytes as usize / octs_per_iter;
                    let tail = *hash_bytes as usize - full * octs_per_iter;

                    for i in 0..N {
                        let o = data_len * i;
                        block[o..o + salt.len()].copy_from_slice(salt);
                        block[o + salt.len()..o + data_len]
                            .copy_from_slice(string);
                    }

                    for _ in 0..full {
                        hash.update(&block[..]);
                    }

                    if tail != 0 {
                        hash.update(&block[0..tail]);
                    }
                }
            }

            hash.digest(data);
            zeros.push(0);
        }

        Ok(ret)
    }

    /// Reads an S2K specifier.
    ///
    /// The GNU dummy specifier, which marks a key whose secret lives
    /// elsewhere, yields `Outcome::Skip`.
    pub fn read(s: &mut Stream) -> Result<Outcome<S2K>> {
        let mut t = s.clone();
        let kind = t.read_u8()?;
        let hash_id = t.read_u8()?;

        if kind == S2K_GNU_DUMMY {
            if t.read_bytes(3)? != b"GNU" {
                return Err(Error::BadData(
                    "Malformed GNU S2K extension".into()).into());
            }
            let _mode = t.read_u8()?;
            *s = t;
            return Ok(Outcome::Skip);
        }

        let (hash, hash_param) =
            pgp_to_algorithm(hash_id, PgpAlgorithmClass::Hash)?;
        let s2k = match kind {
            0 => S2K::Simple { hash, hash_param },
            1 | 3 => {
                let mut salt = [0u8; SALT_SIZE];
                salt.copy_from_slice(t.read_bytes(SALT_SIZE)?);
                if kind == 1 {
                    S2K::Salted { hash, hash_param, salt }
                } else {
                    let hash_bytes = S2K::decode_count(t.read_u8()?);
                    S2K::Iterated { hash, hash_param, salt, hash_bytes }
                }
            }
            k => return Err(Error::BadData(
                format!("Unknown S2K type {}", k)).into()),
        };
        *s = t;
        Ok(Outcome::Ready(s2k))
    }

    /// This function returns an encodable iteration count larger or
    /// equal `hash_bytes`.
    ///
    /// Not all iteration counts are encodable as *Iterated and Salted
    /// S2K*.  The largest encodable hash count is `0x3e00000`.
    pub fn nearest_hash_count(hash_bytes: usize) -> u32 {
        match hash_bytes {
            0..=1024 => 1024,
            0x3e00000..=usize::MAX => 0x3e00000,
            hash_bytes => {
                let hash_bytes = hash_bytes as u32;
                let msb = 32 - hash_bytes.leading_zeros();
                let exp = msb - 11;
                let mantissa = (hash_bytes >> (msb - 5)) & 0b1111;
                let tail_mask = (1 << (msb - 5)) - 1;

                if hash_bytes & tail_mask == 0 {
                    hash_bytes
                } else if mantissa < 0b1111 {
                    Self::decode_count((exp << 4 | (mantissa + 1)) as u8)
                } else {
                    Self::decode_count(((exp + 1) << 4) as u8)
                }
            }
        }
    }

    /// Decodes the OpenPGP encoding of the number of bytes to hash.
    ///
    /// The coded byte is `eeee.mmmm`, meaning `(16 + mmmm) << (6 +
    /// eeee)`.
    pub fn decode_count(coded: u8) -> u32 {
        let mantissa = 16 + (coded as u32 & 15);
        let exp = (coded as u32 >> 4) + 6;

        mantissa << exp
    }

    /// Converts `hash_bytes` into coded count representation.
    ///
    /// # Errors
    ///
    /// Fails with `Error::InvalidArgument` if `hash_bytes` cannot be
    /// encoded. See also [`S2K::nearest_hash_count()`].
    ///
    /// [`S2K::nearest_hash_count()`]: #method.nearest_hash_count
    pub fn encode_count(hash_bytes: u32) -> Result<u8> {
        let msb = 32 - hash_bytes.leading_zeros();
        if msb < 11 || msb > 26 {
            return Err(Error::InvalidArgument(
                format!("S2K: cannot encode iteration count of {}",
                        hash_bytes)).into());
        }

        let exp = msb - 11;
        let mantissa = (hash_bytes >> (msb - 5)) & 0b1111;
        let tail_mask = (1 << (msb - 5)) - 1;

        if tail_mask & hash_bytes != 0 {
            return Err(Error::InvalidArgument(
                format!("S2K: cannot encode iteration count of {}",
                        hash_bytes)).into());
        }

        Ok(mantissa as u8 | (exp as u8) << 4)
    }

    fn hash_id(&self) -> Result<u8> {
        let (hash, param) = self.hash();
        algorithm_to_pgp(hash, param, PgpAlgorithmClass::Hash)
    }
}

impl Serialize for S2K {
    fn serialize<W: io::Write + ?Sized>(&self, o: &mut W) -> Result<()> {
        let hash_id = self.hash_id()?;
        match self {
            S2K::Simple { .. } => {
                o.write_all(&[0, hash_id])?;
            }
            S2K::Salted { salt, .. } => {
                o.write_all(&[1, hash_id])?;
                o.write_all(salt)?;
            }
            S2K::Iterated { salt, hash_bytes, .. } => {
                o.write_all(&[3, hash_id])?;
                o.write_all(salt)?;
                write_byte(o, S2K::encode_count(*hash_bytes)?)?;
            }
        }
        Ok(())
    }

    fn serialized_len(&self) -> usize {
        match self {
            S2K::Simple { .. } => 2,
            S2K::Salted { .. } => 2 + SALT_SIZE,
            S2K::Iterated { .. } => 2 + SALT_SIZE + 1,
        }
    }
}

impl fmt::Display for S2K {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let salt = |salt: &[u8]| salt.iter()
            .map(|b| format!("{:02x}", b)).collect::<String>();
        match self {
            S2K::Simple { hash, .. } =>
                write!(f, "Simple S2K with {}", hash),
            S2K::Salted { hash, salt: s, .. } =>
                write!(f, "Salted S2K with {} and salt {}", hash, salt(s)),
            S2K::Iterated { hash, salt: s, hash_bytes, .. } =>
                write!(f, "Iterated and Salted S2K with {}, salt {} and \
                           {} bytes to hash", hash, salt(s), hash_bytes),
        }
    }
}

#[cfg(test)]
use quickcheck::{Arbitrary, Gen};

#[cfg(test)]
impl Arbitrary for S2K {
    fn arbitrary(g: &mut Gen) -> Self {
        let (hash, hash_param) = *g.choose(&[
            (Algorithm::MD5, 0),
            (Algorithm::SHA1, 0),
            (Algorithm::RIPEMD160, 0),
            (Algorithm::SHA2, 28),
            (Algorithm::SHA2, 32),
            (Algorithm::SHA2, 48),
            (Algorithm::SHA2, 64),
        ]).expect("non-empty");
        let mut salt = [0u8; SALT_SIZE];
        salt.iter_mut().for_each(|b| *b = u8::arbitrary(g));
        match u8::arbitrary(g) % 3 {
            0 => S2K::Simple { hash, hash_param },
            1 => S2K::Salted { hash, hash_param, salt },
            _ => S2K::Iterated {
                hash, hash_param, salt,
                hash_bytes: S2K::decode_count(u8::arbitrary(g)),
            },
        }
    }
}
