//! A software context service.

use std::collections::HashMap;
use std::fmt;

use crate::Error;
use crate::Result;
use crate::crypto::{
    Attribute,
    AttributeValue,
    ContextService,
    Handle,
    SessionKey,
};
use crate::crypto::hash;
use crate::crypto::symmetric::{self, Mode};
use crate::types::{Algorithm, CipherMode};

enum Object {
    Hash(hash::Context),
    Cipher {
        algo: Algorithm,
        mode: CipherMode,
        key_size: usize,
        // Set once a key is loaded.
        cipher: Option<Box<dyn Mode>>,
    },
}

/// A [`ContextService`] backed by the RustCrypto crates.
///
/// Ciphers are only available in CFB mode.
///
///   [`ContextService`]: trait.ContextService.html
#[derive(Default)]
pub struct SoftContextService {
    objects: HashMap<Handle, Object>,
    next: u32,
}

impl fmt::Debug for SoftContextService {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SoftContextService")
            .field("contexts", &self.objects.len())
            .finish()
    }
}

impl SoftContextService {
    /// Creates an empty service.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of live contexts.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns whether there are no live contexts.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn insert(&mut self, object: Object) -> Handle {
        let handle = Handle(self.next);
        self.next = self.next.wrapping_add(1);
        self.objects.insert(handle, object);
        handle
    }

    fn get(&self, handle: Handle) -> Result<&Object> {
        self.objects.get(&handle).ok_or_else(|| Error::InvalidArgument(
            format!("No context {}", handle)).into())
    }

    fn get_mut(&mut self, handle: Handle) -> Result<&mut Object> {
        self.objects.get_mut(&handle).ok_or_else(|| Error::InvalidArgument(
            format!("No context {}", handle)).into())
    }

    fn hash(&mut self, handle: Handle) -> Result<&mut hash::Context> {
        match self.get_mut(handle)? {
            Object::Hash(ctx) => Ok(ctx),
            _ => Err(Error::InvalidArgument(
                format!("Context {} is not a hash", handle)).into()),
        }
    }

    fn cipher(&mut self, handle: Handle) -> Result<&mut Box<dyn Mode>> {
        match self.get_mut(handle)? {
            Object::Cipher { cipher: Some(c), .. } => Ok(c),
            Object::Cipher { cipher: None, .. } =>
                Err(Error::InvalidOperation(
                    format!("Context {} has no key", handle)).into()),
            _ => Err(Error::InvalidArgument(
                format!("Context {} is not a cipher", handle)).into()),
        }
    }
}

impl ContextService for SoftContextService {
    fn create_context(&mut self, algorithm: Algorithm, param: usize,
                      mode: CipherMode) -> Result<Handle> {
        let object = if algorithm.is_hash() {
            Object::Hash(algorithm.context(param)?)
        } else if algorithm.is_conventional() {
            if mode != CipherMode::CFB {
                return Err(Error::NotAvailable(
                    format!("{} in {} mode", algorithm, mode)).into());
            }
            // Fails for stream ciphers.
            algorithm.block_size()?;
            let key_size = if param == 0 {
                algorithm.default_key_size()?
            } else {
                param
            };
            Object::Cipher { algo: algorithm, mode, key_size, cipher: None }
        } else {
            return Err(Error::NotAvailable(
                format!("{} contexts", algorithm)).into());
        };
        Ok(self.insert(object))
    }

    fn release_context(&mut self, handle: Handle) -> Result<()> {
        self.objects.remove(&handle).map(|_| ()).ok_or_else(|| {
            Error::InvalidArgument(format!("No context {}", handle)).into()
        })
    }

    fn clone_context(&mut self, handle: Handle) -> Result<Handle> {
        let object = match self.get(handle)? {
            Object::Hash(ctx) => Object::Hash(ctx.clone()),
            Object::Cipher { .. } => return Err(Error::NotAvailable(
                "Cloning cipher contexts".into()).into()),
        };
        Ok(self.insert(object))
    }

    fn algorithm(&self, handle: Handle) -> Result<Algorithm> {
        Ok(match self.get(handle)? {
            Object::Hash(ctx) => ctx.algo(),
            Object::Cipher { algo, .. } => *algo,
        })
    }

    fn hash_update(&mut self, handle: Handle, data: &[u8]) -> Result<()> {
        self.hash(handle)?.update(data);
        Ok(())
    }

    fn hash_finalize(&mut self, handle: Handle) -> Result<Vec<u8>> {
        let ctx = self.hash(handle)?;
        let mut digest = vec![0; ctx.digest_size()];
        ctx.digest(&mut digest);
        Ok(digest)
    }

    fn get_attribute(&self, handle: Handle, attribute: Attribute)
                     -> Result<AttributeValue> {
        match (self.get(handle)?, attribute) {
            (Object::Hash(ctx), Attribute::BlockSize) =>
                Ok(AttributeValue::Size(ctx.digest_size())),
            (Object::Cipher { algo, .. }, Attribute::BlockSize)
            | (Object::Cipher { algo, .. }, Attribute::IvSize) =>
                Ok(AttributeValue::Size(algo.block_size()?)),
            (Object::Cipher { key_size, .. }, Attribute::KeySize) =>
                Ok(AttributeValue::Size(*key_size)),
            (Object::Cipher { mode, .. }, Attribute::Mode) =>
                Ok(AttributeValue::Mode(*mode)),
            (_, attribute) => Err(Error::InvalidArgument(
                format!("Attribute {:?} of context {} can't be read",
                        attribute, handle)).into()),
        }
    }

    fn set_attribute(&mut self, handle: Handle, attribute: Attribute,
                     value: AttributeValue) -> Result<()> {
        match (self.get_mut(handle)?, attribute, value) {
            (Object::Cipher { key_size, cipher: None, .. },
             Attribute::KeySize, AttributeValue::Size(n)) => {
                *key_size = n;
                Ok(())
            }
            (Object::Cipher { algo, key_size, cipher, .. },
             Attribute::Key, AttributeValue::Key(key)) => {
                if key.len() < *key_size {
                    return Err(Error::InvalidArgument(
                        format!("{} byte key for a {} byte {} context",
                                key.len(), key_size, algo)).into());
                }
                *cipher = Some(symmetric::cfb(*algo, &key[..*key_size])?);
                Ok(())
            }
            (_, attribute, _) => Err(Error::InvalidArgument(
                format!("Attribute {:?} of context {} can't be set",
                        attribute, handle)).into()),
        }
    }

    fn encrypt(&mut self, handle: Handle, data: &mut [u8]) -> Result<()> {
        self.cipher(handle)?.encrypt(data);
        Ok(())
    }

    fn decrypt(&mut self, handle: Handle, data: &mut [u8]) -> Result<()> {
        self.cipher(handle)?.decrypt(data);
        Ok(())
    }

    fn process_iv(&mut self, handle: Handle, iv: &[u8],
                  mdc: Option<Handle>) -> Result<()> {
        let cipher = self.cipher(handle)?;
        let bs = cipher.block_size();
        if iv.len() != bs + 2 {
            return Err(Error::InvalidArgument(
                format!("Encrypted prefix of {} bytes, expected {}",
                        iv.len(), bs + 2)).into());
        }

        let mut prefix: SessionKey = iv.into();
        cipher.decrypt(&mut prefix);
        if prefix[bs - 2..bs] != prefix[bs..] {
            return Err(Error::WrongKey.into());
        }

        match mdc {
            Some(mdc) => self.hash_update(mdc, &prefix),
            None => cipher.resync(&iv[2..]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle() {
        let mut cs = SoftContextService::new();
        let h = cs.create_context(Algorithm::SHA1, 0, CipherMode::None)
            .unwrap();
        cs.hash_update(h, b"ab").unwrap();
        let c = cs.clone_context(h).unwrap();
        cs.hash_update(h, b"c").unwrap();
        cs.hash_update(c, b"c").unwrap();
        assert_eq!(cs.hash_finalize(h).unwrap(), cs.hash_finalize(c).unwrap());
        assert_eq!(cs.get_attribute(h, Attribute::BlockSize).unwrap(),
                   AttributeValue::Size(20));
        assert_eq!(cs.len(), 2);
        cs.release_context(h).unwrap();
        cs.release_context(c).unwrap();
        assert!(cs.is_empty());
        assert!(cs.release_context(h).is_err());
        assert!(cs.hash_update(h, b"x").is_err());
    }

    #[test]
    fn process_iv() {
        let key = [7u8; 16];
        let msg = b"hello, world";

        for mdc in &[false, true] {
            let ct = symmetric::encrypt_prefixed(
                Algorithm::AES, &key, msg, !mdc).unwrap();

            let mut cs = SoftContextService::new();
            let c = cs.create_context(Algorithm::AES, 16, CipherMode::CFB)
                .unwrap();
            assert!(cs.decrypt(c, &mut [0; 4]).is_err());
            cs.set_attribute(c, Attribute::Key,
                             AttributeValue::Key(key[..].into())).unwrap();
            assert_eq!(cs.get_attribute(c, Attribute::IvSize).unwrap(),
                       AttributeValue::Size(16));

            let h = if *mdc {
                Some(cs.create_context(Algorithm::SHA1, 0, CipherMode::None)
                     .unwrap())
            } else {
                None
            };
            cs.process_iv(c, &ct[..18], h).unwrap();
            let mut body = ct[18..].to_vec();
            cs.decrypt(c, &mut body).unwrap();
            assert_eq!(&body[..], &msg[..]);
        }
    }

    #[test]
    fn wrong_key() {
        let ct = symmetric::encrypt_prefixed(
            Algorithm::CAST, &[1; 16], b"x", true).unwrap();
        let mut cs = SoftContextService::new();
        let c = cs.create_context(Algorithm::CAST, 0, CipherMode::CFB).unwrap();
        cs.set_attribute(c, Attribute::Key,
                         AttributeValue::Key(vec![2; 16].into())).unwrap();
        // A wrong key passes the quick check with probability 2^-16.
        let r = cs.process_iv(c, &ct[..10], None);
        if let Err(e) = r {
            assert_eq!(e.downcast_ref::<Error>(), Some(&Error::WrongKey));
        }
    }

    #[test]
    fn unsupported() {
        let mut cs = SoftContextService::new();
        assert!(cs.create_context(Algorithm::AES, 0, CipherMode::CBC).is_err());
        assert!(cs.create_context(Algorithm::RSA, 0, CipherMode::None).is_err());
        assert!(cs.create_context(Algorithm::RC4, 0, CipherMode::CFB).is_err());
    }
}
