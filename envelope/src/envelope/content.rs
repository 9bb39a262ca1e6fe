//! What an envelope learned about its keying and signing material.

use std::fmt;

use crate::Result;
use crate::crypto::{Handle, S2K};
use crate::query::{QueryInfo, Span};
use crate::types::{Algorithm, CipherMode};

/// The kind of resource a content list item needs or describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvInfo {
    /// A password, fed through the item's key derivation.
    Password,
    /// The private key matching the item's key ID.
    PrivateKey,
    /// A raw conventional key.
    Key,
    /// The signer's public key, for checking a signature.
    Signature,
}

impl fmt::Display for EnvInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            EnvInfo::Password => "password",
            EnvInfo::PrivateKey => "private key",
            EnvInfo::Key => "session key",
            EnvInfo::Signature => "signature check key",
        })
    }
}

/// How a session key is protected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncrInfo {
    /// The cipher, or the public key algorithm for public key items.
    pub crypt_algo: Algorithm,
    /// The cipher mode.
    pub crypt_mode: CipherMode,
    /// The cipher's key size in bytes.
    pub key_size: usize,
    /// The password to key transformation.
    pub s2k: Option<S2K>,
    /// The hash used by the key derivation.
    pub key_setup_algo: Option<Algorithm>,
    /// The key derivation hash's parameter.
    pub key_setup_param: usize,
    /// The number of bytes the key derivation hashes.
    pub key_setup_iterations: u32,
    /// The key derivation salt.
    pub salt: Vec<u8>,
}

/// What is known about a signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigInfo {
    /// The signature packet's version, 0 while only the one-pass
    /// packet has been seen.
    pub version: u8,
    /// The signature type.
    pub sig_type: u8,
    /// The public key algorithm.
    pub pk_algo: Option<Algorithm>,
    /// The hash algorithm.
    pub hash_algo: Algorithm,
    /// The hash algorithm's parameter.
    pub hash_param: usize,
    /// The first two bytes of the signed digest, as stored in the
    /// signature.
    pub hash_check: Option<[u8; 2]>,
    /// The hashed attributes: the v3 hashed block or the v4 hashed
    /// area, relative to the item's object.
    pub attributes: Span,
    /// The unhashed attributes.
    pub unauth_attributes: Span,
    /// The digest the signature has to match, once the data has been
    /// hashed.
    pub digest: Option<Vec<u8>>,
    /// Whether `digest` starts with `hash_check`.
    pub hash_check_ok: bool,
}

/// Details of a content list item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemInfo {
    /// A session key carrier.
    Encr(EncrInfo),
    /// A signature.
    Sig(SigInfo),
}

/// A keying or signature object found in the preamble.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentListItem {
    env_info: EnvInfo,
    version: u8,
    object: Vec<u8>,
    key_id: Vec<u8>,
    iands: Span,
    payload: Span,
    info: ItemInfo,
}

impl ContentListItem {
    /// The item for PGP 2's conventionally encrypted data, which has
    /// no session key packet: IDEA keyed with the MD5 of the password.
    pub(crate) fn pgp2_password() -> Self {
        ContentListItem {
            env_info: EnvInfo::Password,
            version: 2,
            object: Vec::new(),
            key_id: Vec::new(),
            iands: Span::default(),
            payload: Span::default(),
            info: ItemInfo::Encr(EncrInfo {
                crypt_algo: Algorithm::IDEA,
                crypt_mode: CipherMode::CFB,
                key_size: 16,
                s2k: Some(S2K::Simple { hash: Algorithm::MD5, hash_param: 0 }),
                key_setup_algo: Some(Algorithm::MD5),
                key_setup_param: 0,
                key_setup_iterations: 0,
                salt: Vec::new(),
            }),
        }
    }

    /// Builds an item from a parsed session key packet.
    pub(crate) fn encrypted_key(object: &[u8], info: &QueryInfo,
                                env_info: EnvInfo)
                                -> Result<Self>
    {
        let crypt_algo = info.crypt_algo.ok_or_else(|| crate::Error::Internal(
            "Session key packet without an algorithm".into()))?;
        Ok(ContentListItem {
            env_info,
            version: info.version,
            object: object.to_vec(),
            key_id: info.key_id.clone(),
            iands: info.iands,
            payload: info.data,
            info: ItemInfo::Encr(EncrInfo {
                crypt_algo,
                crypt_mode: info.crypt_mode,
                key_size: info.key_size,
                s2k: info.s2k,
                key_setup_algo: info.key_setup_algo,
                key_setup_param: info.key_setup_param,
                key_setup_iterations: info.key_setup_iterations,
                salt: info.salt.clone(),
            }),
        })
    }

    /// Builds a signature item.
    ///
    /// A one-pass signature has no object yet; it is attached with
    /// [`complete_signature`] once the trailing packet arrives.
    ///
    ///   [`complete_signature`]: #method.complete_signature
    pub(crate) fn signature(object: &[u8], key_id: &[u8], sig: SigInfo,
                            iands: Span, payload: Span)
                            -> Self
    {
        ContentListItem {
            env_info: EnvInfo::Signature,
            version: sig.version,
            object: object.to_vec(),
            key_id: key_id.to_vec(),
            iands,
            payload,
            info: ItemInfo::Sig(sig),
        }
    }

    /// Attaches the trailing signature packet to a one-pass item.
    pub(crate) fn complete_signature(&mut self, object: &[u8],
                                     info: &QueryInfo)
                                     -> Result<()>
    {
        let sig = match &mut self.info {
            ItemInfo::Sig(sig) => sig,
            ItemInfo::Encr(_) => return Err(crate::Error::Internal(
                "Not a signature item".into()).into()),
        };
        if info.hash_algo != Some(sig.hash_algo)
            || info.hash_param != sig.hash_param
        {
            return Err(bad_data!(
                "Signature hash algorithm {:?} doesn't match the announced {}",
                info.hash_algo, sig.hash_algo));
        }
        if info.key_id != self.key_id {
            return Err(bad_data!(
                "Signature key ID doesn't match the announced one"));
        }

        sig.version = info.version;
        sig.sig_type = info.sig_type;
        sig.pk_algo = info.crypt_algo;
        sig.hash_check = info.hash_check;
        sig.attributes = info.attributes;
        sig.unauth_attributes = info.unauth_attributes;
        self.version = info.version;
        self.object = object.to_vec();
        self.iands = info.iands;
        self.payload = info.data;
        Ok(())
    }

    /// Returns the resource this item needs.
    pub fn env_info(&self) -> EnvInfo {
        self.env_info
    }

    /// Returns the PGP version of the item's packet.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the encoded packet.
    ///
    /// Empty for the PGP 2 password item and for a one-pass signature
    /// whose trailing packet hasn't been read.
    pub fn object(&self) -> &[u8] {
        &self.object
    }

    /// Returns the key ID, if the packet carries one.
    pub fn key_id(&self) -> &[u8] {
        &self.key_id
    }

    /// Returns the signer's IssuerAndSerialNumber, if the signature
    /// carries one.
    pub fn issuer_and_serial_number(&self) -> Option<&[u8]> {
        self.slice(self.iands)
    }

    /// Returns the encrypted session key or signature value.
    pub fn payload(&self) -> Option<&[u8]> {
        self.slice(self.payload)
    }

    /// Returns the signature's hashed attributes.
    pub fn attributes(&self) -> Option<&[u8]> {
        match &self.info {
            ItemInfo::Sig(sig) => self.slice(sig.attributes),
            ItemInfo::Encr(_) => None,
        }
    }

    /// Returns the item's details.
    pub fn info(&self) -> &ItemInfo {
        &self.info
    }

    /// Returns the session key details, if this is a key item.
    pub fn encr_info(&self) -> Option<&EncrInfo> {
        match &self.info {
            ItemInfo::Encr(e) => Some(e),
            ItemInfo::Sig(_) => None,
        }
    }

    /// Returns the signature details, if this is a signature item.
    pub fn sig_info(&self) -> Option<&SigInfo> {
        match &self.info {
            ItemInfo::Sig(s) => Some(s),
            ItemInfo::Encr(_) => None,
        }
    }

    pub(crate) fn sig_info_mut(&mut self) -> Option<&mut SigInfo> {
        match &mut self.info {
            ItemInfo::Sig(s) => Some(s),
            ItemInfo::Encr(_) => None,
        }
    }

    fn slice(&self, span: Span) -> Option<&[u8]> {
        if span.is_empty() {
            None
        } else {
            span.slice(&self.object).ok()
        }
    }
}

/// What an action does to the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ActionKind {
    /// Decrypts the payload.
    Crypt,
    /// Hashes the signed data.
    Hash,
    /// Hashes the plaintext for the modification detection code.
    Mdc,
}

/// A context applied to the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Action {
    pub kind: ActionKind,
    pub handle: Handle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::query::ObjectType;

    fn one_pass() -> ContentListItem {
        let sig = SigInfo {
            version: 0,
            sig_type: 0,
            pk_algo: Some(Algorithm::RSA),
            hash_algo: Algorithm::SHA2,
            hash_param: 32,
            hash_check: None,
            attributes: Span::default(),
            unauth_attributes: Span::default(),
            digest: None,
            hash_check_ok: false,
        };
        ContentListItem::signature(&[], &[1; 8], sig, Span::default(),
                                   Span::default())
    }

    #[test]
    fn completion() {
        let object = vec![0xAA; 40];
        let mut info = QueryInfo::new(ObjectType::Signature);
        info.version = 4;
        info.hash_algo = Some(Algorithm::SHA2);
        info.hash_param = 32;
        info.key_id = vec![1; 8];
        info.data = Span::new(10, 30);

        let mut item = one_pass();
        assert!(item.object().is_empty());
        assert_eq!(item.payload(), None);
        item.complete_signature(&object, &info).unwrap();
        assert_eq!(item.version(), 4);
        assert_eq!(item.payload().unwrap().len(), 30);

        let mut item = one_pass();
        info.key_id = vec![2; 8];
        let e = item.complete_signature(&object, &info).unwrap_err();
        assert!(matches!(e.downcast_ref::<Error>(), Some(Error::BadData(_))));

        let mut item = one_pass();
        info.key_id = vec![1; 8];
        info.hash_param = 64;
        assert!(item.complete_signature(&object, &info).is_err());
    }

    #[test]
    fn pgp2() {
        let item = ContentListItem::pgp2_password();
        assert_eq!(item.env_info(), EnvInfo::Password);
        let e = item.encr_info().unwrap();
        assert_eq!(e.crypt_algo, Algorithm::IDEA);
        assert_eq!(e.s2k.unwrap().hash(), (Algorithm::MD5, 0));
        assert!(item.sig_info().is_none());
    }
}
