//! Block ciphers in OpenPGP's CFB mode.
//!
//! OpenPGP uses full-block CFB with a zero IV and a random prefix in
//! place of an IV.  Without an MDC, the mode is resynchronised on the
//! ciphertext after the prefix.  See [Section 13.9 of RFC 4880].
//!
//!   [Section 13.9 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-13.9

use cipher::{BlockCipher, NewBlockCipher};
use generic_array::GenericArray;

use crate::Error;
use crate::Result;
use crate::types::Algorithm;

/// A block cipher mode that encrypts and decrypts in place.
pub trait Mode {
    /// Block size of the underlying cipher in bytes.
    fn block_size(&self) -> usize;

    /// Encrypts `data` in place.
    fn encrypt(&mut self, data: &mut [u8]);

    /// Decrypts `data` in place.
    fn decrypt(&mut self, data: &mut [u8]);

    /// Replaces the feedback register and restarts at a block
    /// boundary.
    fn resync(&mut self, iv: &[u8]) -> Result<()>;
}

/// CFB mode over a block cipher.
struct Cfb<C: BlockCipher> {
    cipher: C,
    // Holds the encrypted register; bytes before `pos` have been
    // replaced by ciphertext.
    register: GenericArray<u8, C::BlockSize>,
    pos: usize,
}

impl<C: BlockCipher + NewBlockCipher> Cfb<C> {
    fn new(key: &[u8]) -> Result<Self> {
        let cipher = C::new_varkey(key)
            .map_err(|_| Error::InvalidArgument(
                format!("Invalid key length {}", key.len())))?;
        let register = GenericArray::default();
        let pos = register.len();
        Ok(Cfb { cipher, register, pos })
    }

    fn next_byte(&mut self) -> &mut u8 {
        if self.pos == self.register.len() {
            self.cipher.encrypt_block(&mut self.register);
            self.pos = 0;
        }
        let b = &mut self.register[self.pos];
        self.pos += 1;
        b
    }
}

impl<C: BlockCipher + NewBlockCipher> Mode for Cfb<C> {
    fn block_size(&self) -> usize {
        self.register.len()
    }

    fn encrypt(&mut self, data: &mut [u8]) {
        for b in data.iter_mut() {
            let r = self.next_byte();
            *r ^= *b;
            *b = *r;
        }
    }

    fn decrypt(&mut self, data: &mut [u8]) {
        for b in data.iter_mut() {
            let r = self.next_byte();
            let c = *b;
            *b ^= *r;
            *r = c;
        }
    }

    fn resync(&mut self, iv: &[u8]) -> Result<()> {
        if iv.len() != self.register.len() {
            return Err(Error::InvalidArgument(
                format!("IV of {} bytes, expected {}",
                        iv.len(), self.register.len())).into());
        }
        self.register.copy_from_slice(iv);
        self.pos = self.register.len();
        Ok(())
    }
}

/// Creates a CFB mode instance with a zero IV.
pub fn cfb(algo: Algorithm, key: &[u8]) -> Result<Box<dyn Mode>> {
    Ok(match (algo, key.len()) {
        (Algorithm::DES, _) => Box::new(Cfb::<des::Des>::new(key)?),
        (Algorithm::TripleDES, _) =>
            Box::new(Cfb::<des::TdesEde3>::new(key)?),
        (Algorithm::IDEA, _) => Box::new(Cfb::<idea::Idea>::new(key)?),
        (Algorithm::CAST, _) => Box::new(Cfb::<cast5::Cast5>::new(key)?),
        (Algorithm::Blowfish, _) =>
            Box::new(Cfb::<blowfish::Blowfish>::new(key)?),
        (Algorithm::AES, 16) => Box::new(Cfb::<aes::Aes128>::new(key)?),
        (Algorithm::AES, 24) => Box::new(Cfb::<aes::Aes192>::new(key)?),
        (Algorithm::AES, 32) => Box::new(Cfb::<aes::Aes256>::new(key)?),
        (Algorithm::AES, n) => return Err(Error::InvalidArgument(
            format!("Invalid AES key length {}", n)).into()),
        (Algorithm::Twofish, _) =>
            Box::new(Cfb::<twofish::Twofish>::new(key)?),
        (a, _) => return Err(Error::NotAvailable(
            format!("Cipher {}", a)).into()),
    })
}

/// Encrypts `plaintext` the way OpenPGP encrypted data packets do.
///
/// A random prefix of one block plus the repeated last two bytes is
/// prepended.  If `resync` is set, the mode is resynchronised after
/// the prefix, as used by packets without an MDC.
pub fn encrypt_prefixed(algo: Algorithm, key: &[u8], plaintext: &[u8],
                        resync: bool)
                        -> Result<Vec<u8>>
{
    let mut mode = cfb(algo, key)?;
    let bs = mode.block_size();

    let mut out = vec![0; bs + 2];
    super::random(&mut out[..bs]);
    out[bs] = out[bs - 2];
    out[bs + 1] = out[bs - 1];
    mode.encrypt(&mut out);
    if resync {
        let iv = out[2..bs + 2].to_vec();
        mode.resync(&iv)?;
    }

    let mut body = plaintext.to_vec();
    mode.encrypt(&mut body);
    out.extend_from_slice(&body);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // AES-128 CFB from NIST SP 800-38A, F.3.13.
    #[test]
    fn aes_cfb128_vector() {
        let key = [0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6,
                   0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c];
        let iv: Vec<u8> = (0..16).collect();
        let plaintext = [0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96,
                         0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17, 0x2a,
                         0xae, 0x2d, 0x8a, 0x57];
        let expected = [0x3b, 0x3f, 0xd9, 0x2e, 0xb7, 0x2d, 0xad, 0x20,
                        0x33, 0x34, 0x49, 0xf8, 0xe8, 0x3c, 0xfb, 0x4a,
                        0xc8, 0xa6, 0x45, 0x37];

        let mut mode = cfb(Algorithm::AES, &key).unwrap();
        mode.resync(&iv).unwrap();
        let mut data = plaintext;
        mode.encrypt(&mut data);
        assert_eq!(data, expected);

        // Decrypt in odd-sized pieces.
        let mut mode = cfb(Algorithm::AES, &key).unwrap();
        mode.resync(&iv).unwrap();
        let (a, b) = data.split_at_mut(3);
        mode.decrypt(a);
        mode.decrypt(b);
        assert_eq!(data, plaintext);
    }

    #[test]
    fn all_ciphers() {
        for (algo, key_size) in &[(Algorithm::DES, 8),
                                  (Algorithm::TripleDES, 24),
                                  (Algorithm::IDEA, 16),
                                  (Algorithm::CAST, 16),
                                  (Algorithm::Blowfish, 16),
                                  (Algorithm::AES, 16),
                                  (Algorithm::AES, 24),
                                  (Algorithm::AES, 32),
                                  (Algorithm::Twofish, 32)] {
            let key = vec![0x42; *key_size];
            let msg = b"attack at dawn, or maybe a little later";
            for resync in &[false, true] {
                let ct = encrypt_prefixed(*algo, &key, msg, *resync).unwrap();
                let mut mode = cfb(*algo, &key).unwrap();
                let bs = mode.block_size();
                assert_eq!(bs, algo.block_size().unwrap());

                let mut data = ct.clone();
                let (prefix, body) = data.split_at_mut(bs + 2);
                mode.decrypt(prefix);
                assert_eq!(prefix[bs - 2..bs], prefix[bs..]);
                if *resync {
                    mode.resync(&ct[2..bs + 2]).unwrap();
                }
                mode.decrypt(body);
                assert_eq!(&body[..], &msg[..]);
            }
        }
    }

    #[test]
    fn unsupported() {
        assert!(cfb(Algorithm::RC4, &[0; 16]).is_err());
        assert!(cfb(Algorithm::AES, &[0; 20]).is_err());
    }
}
