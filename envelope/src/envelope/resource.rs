//! Supplying keys to an envelope.

use crate::Error;
use crate::Result;
use crate::crypto::{Attribute, AttributeValue, Password, SessionKey};
use crate::envelope::{EnvInfo, Envelope, Progress, State};
use crate::envelope::content::{Action, ActionKind};
use crate::types::{
    pgp_to_algorithm,
    Algorithm,
    CipherMode,
    PgpAlgorithmClass,
};

fn is_wrong_key(e: &anyhow::Error) -> bool {
    matches!(crate::error_kind(e), Some(Error::WrongKey))
}

impl Envelope {
    /// Supplies a password.
    ///
    /// The password is tried against every password item in the
    /// content list, in order.  If none of them yields a key that
    /// decrypts the data, this fails with `Error::WrongKey` and the
    /// envelope waits for another attempt.
    ///
    /// On success, processing continues and its progress is
    /// returned.
    pub fn add_password<P: AsRef<[u8]>>(&mut self, password: P)
                                        -> Result<Progress>
    {
        tracer!("Envelope::add_password");
        self.check_resource_wanted()?;

        let password = Password::from(password.as_ref());
        let candidates: Vec<usize> = self.content_list.iter().enumerate()
            .filter(|(_, i)| i.env_info() == EnvInfo::Password)
            .map(|(n, _)| n)
            .collect();
        if candidates.is_empty() {
            return Err(Error::InvalidOperation(
                "The message isn't password protected".into()).into());
        }

        for n in candidates {
            let (algo, key) = match self.password_to_key(n, &password) {
                Ok(k) => k,
                Err(e) if is_wrong_key(&e) => {
                    t!("Item {} rejects the password", n);
                    continue;
                }
                Err(e) => return Err(e),
            };
            match self.use_key(algo, key) {
                Err(e) if is_wrong_key(&e) => {
                    t!("Key from item {} fails the quick check", n);
                    continue;
                }
                r => return r,
            }
        }
        Err(Error::WrongKey.into())
    }

    /// Supplies the session key directly.
    pub fn add_session_key(&mut self, algorithm: Algorithm, key: &[u8])
                           -> Result<Progress>
    {
        self.check_resource_wanted()?;
        if ! algorithm.is_conventional() {
            return Err(Error::InvalidArgument(
                format!("{} is not a cipher", algorithm)).into());
        }
        self.use_key(algorithm, key.into())
    }

    /// Treats the message as a detached signature.
    ///
    /// The data pushed after the signature is hashed rather than
    /// returned, and the digest is made available in the signature's
    /// content list item.  This has to be called before anything is
    /// pushed.
    pub fn set_detached_signature(&mut self) -> Result<()> {
        if self.state != State::None || self.packets_seen > 0
            || ! self.input.is_empty()
        {
            return Err(Error::InvalidOperation(
                "Detached signature mode has to be set before pushing \
                 data".into()).into());
        }
        self.detached = true;
        Ok(())
    }

    fn check_resource_wanted(&self) -> Result<()> {
        self.check_usable()?;
        if ! matches!(self.progress, Progress::NeedResource(_)) {
            return Err(Error::InvalidOperation(
                "The envelope doesn't need a key".into()).into());
        }
        Ok(())
    }

    /// Derives the key for the password item at `n`.
    ///
    /// If the item carries an encrypted session key, it is decrypted
    /// with the derived key.
    fn password_to_key(&mut self, n: usize, password: &Password)
                       -> Result<(Algorithm, SessionKey)>
    {
        let item = &self.content_list[n];
        let encr = item.encr_info().ok_or_else(|| Error::Internal(
            "Password item without key derivation".into()))?;
        let s2k = encr.s2k.ok_or_else(|| Error::NotAvailable(
            "Key derivation without an S2K specifier".into()))?;
        let (crypt_algo, key_size) = (encr.crypt_algo, encr.key_size);
        let esk = item.payload().map(SessionKey::from);

        let kek = s2k.derive_key(password, key_size)?;
        let mut esk = match esk {
            Some(esk) => esk,
            None => return Ok((crypt_algo, kek)),
        };

        // The session key is encrypted in CFB mode with a zero IV.
        let h = self.service.create_context(crypt_algo, key_size,
                                            CipherMode::CFB)?;
        let r = self.service.set_attribute(h, Attribute::Key,
                                           AttributeValue::Key(kek))
            .and_then(|_| self.service.decrypt(h, &mut esk));
        self.service.release_context(h)?;
        r?;

        let (algo, size) = pgp_to_algorithm(esk[0], PgpAlgorithmClass::Crypt)
            .map_err(|_| Error::WrongKey)?;
        if esk.len() - 1 != size {
            return Err(Error::WrongKey.into());
        }
        Ok((algo, esk[1..].into()))
    }

    /// Installs a session key and continues processing.
    fn use_key(&mut self, algo: Algorithm, key: SessionKey)
               -> Result<Progress>
    {
        if self.action(ActionKind::Crypt).is_some() {
            return Err(Error::Internal("A key is already installed".into())
                       .into());
        }
        let handle = self.service.create_context(algo, key.len(),
                                                 CipherMode::CFB)?;
        if let Err(e) = self.service.set_attribute(handle, Attribute::Key,
                                                   AttributeValue::Key(key))
        {
            self.release_context(handle);
            return Err(e);
        }
        self.actions.push(Action { kind: ActionKind::Crypt, handle });
        log::debug!("Trying a {} key", algo);

        // A wrong key is withdrawn by the prefix check.
        self.run()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::Config;
    use crate::crypto::{ContextService, Handle, SoftContextService};

    // Rejects every key and fails to release contexts, recording the
    // attempts.
    struct KeyRejecting {
        inner: SoftContextService,
        released: Rc<RefCell<Vec<Handle>>>,
    }

    impl ContextService for KeyRejecting {
        fn create_context(&mut self, algorithm: Algorithm, param: usize,
                          mode: CipherMode) -> Result<Handle> {
            self.inner.create_context(algorithm, param, mode)
        }

        fn release_context(&mut self, handle: Handle) -> Result<()> {
            self.released.borrow_mut().push(handle);
            Err(Error::Internal("Context is busy".into()).into())
        }

        fn clone_context(&mut self, handle: Handle) -> Result<Handle> {
            self.inner.clone_context(handle)
        }

        fn algorithm(&self, handle: Handle) -> Result<Algorithm> {
            self.inner.algorithm(handle)
        }

        fn hash_update(&mut self, handle: Handle, data: &[u8]) -> Result<()> {
            self.inner.hash_update(handle, data)
        }

        fn hash_finalize(&mut self, handle: Handle) -> Result<Vec<u8>> {
            self.inner.hash_finalize(handle)
        }

        fn get_attribute(&self, handle: Handle, attribute: Attribute)
                         -> Result<AttributeValue> {
            self.inner.get_attribute(handle, attribute)
        }

        fn set_attribute(&mut self, handle: Handle, attribute: Attribute,
                         value: AttributeValue) -> Result<()> {
            if attribute == Attribute::Key {
                return Err(Error::NotAvailable("Keys".into()).into());
            }
            self.inner.set_attribute(handle, attribute, value)
        }

        fn encrypt(&mut self, handle: Handle, data: &mut [u8]) -> Result<()> {
            self.inner.encrypt(handle, data)
        }

        fn decrypt(&mut self, handle: Handle, data: &mut [u8]) -> Result<()> {
            self.inner.decrypt(handle, data)
        }

        fn process_iv(&mut self, handle: Handle, iv: &[u8],
                      mdc: Option<Handle>) -> Result<()> {
            self.inner.process_iv(handle, iv, mdc)
        }
    }

    #[test]
    fn rejected_key_is_released() {
        let released = Rc::new(RefCell::new(Vec::new()));
        let service = KeyRejecting {
            inner: SoftContextService::new(),
            released: released.clone(),
        };
        let mut e = Envelope::with_service(Config::default(),
                                           Box::new(service));

        // PGP 2 style encrypted data without a session key packet.
        let mut message = vec![0xC9, 40];
        message.extend_from_slice(&[0x55; 40]);
        let pushed = e.push(&message).unwrap();
        assert_eq!(pushed.progress, Progress::NeedResource(EnvInfo::Password));

        // The failed release is logged, and the key error reported.
        let err = e.add_session_key(Algorithm::AES, &[7; 16]).unwrap_err();
        assert!(matches!(crate::error_kind(&err),
                         Some(Error::NotAvailable(_))), "{}", err);
        assert_eq!(released.borrow().len(), 1);

        // The envelope still waits for a key.
        assert!(e.add_session_key(Algorithm::AES, &[7; 16]).is_err());
        assert_eq!(released.borrow().len(), 2);
    }

    #[test]
    fn unwanted_keys() {
        let mut e = Envelope::new(Config::default());
        let err = e.add_password("swordfish").unwrap_err();
        assert!(matches!(crate::error_kind(&err),
                         Some(Error::InvalidOperation(_))));
        let err = e.add_session_key(Algorithm::AES, &[0; 16]).unwrap_err();
        assert!(matches!(crate::error_kind(&err),
                         Some(Error::InvalidOperation(_))));
        // Neither attempt poisons the envelope.
        assert!(e.set_detached_signature().is_ok());
    }

    #[test]
    fn detached_mode_needs_a_fresh_envelope() {
        let mut e = Envelope::new(Config::default());
        // A marker packet.
        e.push(&[0xCA, 0x03, b'P', b'G', b'P']).unwrap();
        assert!(e.set_detached_signature().is_err());
    }
}
