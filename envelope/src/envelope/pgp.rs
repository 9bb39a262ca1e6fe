//! The PGP message grammar.
//!
//! The preamble is everything in front of the payload: marker
//! packets, session key packets, signature and one-pass signature
//! packets, and the headers of the packet that carries the payload.
//! The postamble is what follows it: the MDC packet inside the
//! plaintext, or the signature packet that closes a one-pass signed
//! message.
//!
//! Every step either completes and consumes its input, or fails with
//! `Error::Underflow` without changing anything, so that it can be
//! retried once more input has arrived.

use anyhow::Context;

use crate::Error;
use crate::Result;
use crate::crypto::{Attribute, S2K};
use crate::envelope::{
    ContentListItem,
    EnvInfo,
    Envelope,
    Progress,
    SigInfo,
    State,
};
use crate::envelope::compress::Decompressor;
use crate::envelope::content::{Action, ActionKind};
use crate::envelope::data::{is_underflow, Framing};
use crate::keyex;
use crate::packet::{
    self,
    BodyLength,
    Header,
    MAX_OBJECT_LENGTH,
    MDC_PACKET_SIZE,
    Tag,
};
use crate::query::Span;
use crate::signature;
use crate::signature::pgp::OnePassSig;
use crate::stream::{self, Stream};
use crate::types::{Algorithm, CipherMode, ContentType, Usage};

/// The encrypted prefix is a block of random data plus two check
/// bytes.  We wait for the prefix of the largest block size before
/// asking for a key.
const MAX_PREFIX_SIZE: usize = 16 + 2;

/// The version 4 signature hash trailer's marker.
const V4_TRAILER: [u8; 2] = [0x04, 0xFF];

/// What the plaintext of an encrypted or compressed packet starts
/// with.
#[derive(Debug, PartialEq, Eq)]
enum Inner {
    /// A literal data packet.  `strip` header bytes precede the data;
    /// `left` is the data's length, if it is known.
    Literal {
        strip: usize,
        left: Option<u64>,
    },
    /// A literal data packet with partial body lengths.
    Partial,
    /// Another layer.
    Nested(ContentType),
}

/// Skips the format, file name and date of a literal data packet.
///
/// Returns the number of bytes skipped.
fn skip_literal_fields(s: &mut Stream) -> Result<usize> {
    let start = s.tell();
    let _format = s.read_u8()?;
    let name_len = s.read_u8()? as usize;
    s.skip(name_len)?;
    // The date.
    s.skip(4)?;
    Ok(s.tell() - start)
}

/// Returns the number of body bytes in front of the data of a
/// literal packet with the given length.
fn literal_framing(length: &BodyLength, used: usize) -> Result<Framing> {
    let framing = Framing::new(length, used)?;
    if framing == Framing::Definite(0) {
        return Err(bad_data!("Literal data packet without data"));
    }
    Ok(framing)
}

/// Identifies the packet at the start of a plaintext.
fn classify(plain: &[u8]) -> Result<Inner> {
    tracer!("envelope::pgp::classify");

    let mut s = Stream::new(plain);
    let header = packet::read_packet_header(&mut s, 1, u32::MAX as usize,
                                            true)?;
    t!("{} packet, {:?}", header.tag(), header.length());
    Ok(match header.tag() {
        Tag::Literal => match header.length() {
            BodyLength::Partial(_) => Inner::Partial,
            length => {
                let used = skip_literal_fields(&mut s)?;
                let left = match literal_framing(length, used)? {
                    Framing::Definite(n) => Some(n),
                    _ => None,
                };
                Inner::Literal { strip: s.tell(), left }
            }
        },
        Tag::CompressedData => Inner::Nested(ContentType::CompressedData),
        Tag::SKE | Tag::Encrypted | Tag::EncryptedMDC =>
            Inner::Nested(ContentType::EncryptedData),
        Tag::PKE => Inner::Nested(ContentType::EnvelopedData),
        Tag::Signature | Tag::OnePassSig =>
            Inner::Nested(ContentType::SignedData),
        t => return Err(bad_data!(
            "Unrecognised PGP packet type {} in the encapsulated content",
            u8::from(t))),
    })
}

impl Envelope {
    /// Largest packet that is parsed as a whole.
    fn object_limit(&self) -> usize {
        self.config.get_buffer_size().min(MAX_OBJECT_LENGTH)
    }

    /// Drops a processed packet from the input.
    fn consume(&mut self, amount: usize, header: &Header) {
        self.input.drain(..amount);
        self.packets_seen += 1;
        self.version = self.version.max(header.version());
    }

    /// Runs one preamble step.
    pub(super) fn process_preamble(&mut self) -> Result<Option<Progress>> {
        match self.state {
            State::None | State::EncrHdr => {
                self.process_packet_header()?;
                Ok(None)
            }
            State::Encr | State::EncrMdc => self.process_encrypted_prefix()
                .context("Invalid PGP encrypted data packet header"),
            State::Data => {
                let next = match self.usage {
                    Usage::None => State::Done,
                    _ => State::DataHeader,
                };
                self.set_state(next);
                Ok(None)
            }
            State::DataHeader => self.process_data_header(),
            State::Done => Err(Error::Internal(
                "Preamble step in the payload".into()).into()),
        }
    }

    fn process_packet_header(&mut self) -> Result<()> {
        tracer!("Envelope::process_packet_header");

        let min_length = if self.state == State::EncrHdr { 8 } else { 3 };
        let mut s = Stream::new(&self.input);
        let header = packet::read_packet_header(&mut s, min_length,
                                                u32::MAX as usize, true)
            .context("Invalid PGP packet header")?;
        let tag = header.tag();
        t!("{} packet, {:?}", tag, header.length());

        if self.packets_seen >= self.config.get_max_packets() {
            return Err(bad_data!("More than {} packets in the preamble",
                                 self.config.get_max_packets()));
        }
        if self.state == State::EncrHdr
            && ! matches!(tag, Tag::SKE | Tag::PKE | Tag::Encrypted
                          | Tag::EncryptedMDC)
        {
            return Err(bad_data!("Expected a session key or encrypted data \
                                  packet, got packet type {}", u8::from(tag)));
        }
        if ! header.length().is_definite()
            && ! matches!(tag, Tag::Literal | Tag::CompressedData
                          | Tag::Encrypted | Tag::EncryptedMDC)
        {
            return Err(bad_data!("Indefinite length not allowed for {}", tag));
        }
        let header_len = header.header_len();

        match tag {
            Tag::Marker => {
                if self.state != State::None {
                    return Err(bad_data!("Marker packet after other packets"));
                }
                if let BodyLength::Full(l) = header.length() {
                    s.skip(*l as usize)?;
                }
                log::warn!("Skipping a marker packet");
                let used = s.tell();
                self.consume(used, &header);
            }

            Tag::Literal => {
                let used = skip_literal_fields(&mut s)?;
                let framing = literal_framing(header.length(), used)?;
                let used = s.tell();
                self.payload.start(framing);
                self.content_type = ContentType::Data;
                self.consume(used, &header);
                self.set_state(State::Data);
            }

            Tag::CompressedData => {
                let algo = s.read_u8()?;
                let framing = Framing::new(header.length(), 1)?;
                let d = Decompressor::new(algo)?;
                t!("{} compressed data", d.name());
                let used = s.tell();
                self.payload.start(framing);
                self.payload.decompressor = Some(d);
                self.usage = Usage::Compress;
                self.consume(used, &header);
                self.set_state(State::Data);
            }

            Tag::SKE | Tag::PKE => {
                if ! matches!(self.usage, Usage::None | Usage::Crypt) {
                    return Err(bad_data!("{} after a {:?} packet", tag,
                                         self.usage));
                }
                self.check_object_size(&header)?;
                let mut t = Stream::new(&self.input);
                let (info, env_info) = if tag == Tag::SKE {
                    let info = keyex::pgp::read_ske(&mut t)
                        .context("Invalid PGP SKE packet")?;
                    if let Some(S2K::Simple { .. }) = info.s2k {
                        return Err(bad_data!("Insecure S2K in SKE packet"));
                    }
                    (info, EnvInfo::Password)
                } else {
                    let info = keyex::pgp::read_pke(&mut t)
                        .context("Invalid PGP PKE packet")?;
                    (info, EnvInfo::PrivateKey)
                };
                let item = ContentListItem::encrypted_key(
                    &self.input[..info.size], &info, env_info)?;
                log::debug!("{} needs a {}", tag, env_info);
                self.content_list.push(item);
                self.usage = Usage::Crypt;
                self.consume(info.size, &header);
                self.set_state(State::EncrHdr);
            }

            Tag::Signature | Tag::OnePassSig => {
                if self.detached && tag == Tag::OnePassSig {
                    return Err(bad_data!(
                        "One-pass signature in a detached signature"));
                }
                if self.usage != Usage::None {
                    return Err(bad_data!("{} after a {:?} packet", tag,
                                         self.usage));
                }
                self.check_object_size(&header)?;
                let size = self.read_signature_item(tag)?;
                self.usage = Usage::Sign;
                self.consume(size, &header);
                if self.detached {
                    self.payload.start(Framing::Indeterminate);
                    self.payload.hashing = true;
                    self.set_state(State::Done);
                } else {
                    self.set_state(State::Data);
                }
            }

            Tag::Encrypted | Tag::EncryptedMDC => {
                if ! matches!(self.usage, Usage::None | Usage::Crypt) {
                    return Err(bad_data!("{} after a {:?} packet", tag,
                                         self.usage));
                }
                let framing = if tag == Tag::EncryptedMDC {
                    let version = s.read_u8()?;
                    if version != 1 {
                        return Err(bad_data!(
                            "Invalid MDC packet header version {}", version));
                    }
                    Framing::new(header.length(), 1)?
                } else {
                    Framing::new(header.length(), 0)?
                };
                let used = s.tell();
                self.payload.start(framing);
                self.usage = Usage::Crypt;
                self.consume(used, &header);
                self.set_state(if tag == Tag::EncryptedMDC {
                    State::EncrMdc
                } else {
                    State::Encr
                });
            }

            t => return Err(bad_data!("Unrecognised PGP packet type {}",
                                      u8::from(t))),
        }

        t!("{} of {} header bytes consumed", tag, header_len);
        Ok(())
    }

    fn check_object_size(&self, header: &Header) -> Result<()> {
        if let BodyLength::Full(l) = header.length() {
            let size = header.header_len() + *l as usize;
            if size > self.object_limit() {
                return Err(bad_data!("{} packet of {} bytes exceeds the limit \
                                      of {}", header.tag(), size,
                                     self.object_limit()));
            }
        }
        Ok(())
    }

    /// Parses a signature or one-pass signature packet at the start
    /// of the input, and sets up hashing for it.
    ///
    /// Returns the packet's size.
    fn read_signature_item(&mut self, tag: Tag) -> Result<usize> {
        let mut s = Stream::new(&self.input);
        let (item, size) = if tag == Tag::Signature {
            let info = signature::pgp::read_with_limit(
                &mut s, self.config.get_max_subpackets())
                .context("Invalid PGP signature packet")?;
            let hash_algo = info.hash_algo.ok_or_else(|| Error::Internal(
                "Signature without a hash algorithm".into()))?;
            let sig = SigInfo {
                version: info.version,
                sig_type: info.sig_type,
                pk_algo: info.crypt_algo,
                hash_algo,
                hash_param: info.hash_param,
                hash_check: info.hash_check,
                attributes: info.attributes,
                unauth_attributes: info.unauth_attributes,
                digest: None,
                hash_check_ok: false,
            };
            (ContentListItem::signature(&self.input[..info.size],
                                        &info.key_id, sig, info.iands,
                                        info.data),
             info.size)
        } else {
            let header = packet::read_object_header(
                &mut s, Tag::OnePassSig, signature::pgp::ONE_PASS_SIZE)?;
            let len = match header.length() {
                BodyLength::Full(l) => *l as usize,
                _ => return Err(Error::Internal(
                    "One-pass signature of indefinite length".into()).into()),
            };
            let ops = OnePassSig::from_body(s.read_bytes(len)?)
                .map_err(|e| stream::truncated(e, "one-pass signature"))
                .context("Invalid PGP one-pass signature packet")?;
            if ! ops.last {
                log::debug!("Nested one-pass signatures aren't followed");
            }
            let sig = SigInfo {
                version: 0,
                sig_type: ops.sig_type,
                pk_algo: Some(ops.pk_algo),
                hash_algo: ops.hash_algo,
                hash_param: ops.hash_param,
                hash_check: None,
                attributes: Span::default(),
                unauth_attributes: Span::default(),
                digest: None,
                hash_check_ok: false,
            };
            (ContentListItem::signature(&[], &ops.key_id, sig,
                                        Span::default(), Span::default()),
             s.tell())
        };

        let (hash_algo, hash_param) = item.sig_info()
            .map(|sig| (sig.hash_algo, sig.hash_param))
            .ok_or_else(|| Error::Internal("Not a signature item".into()))?;
        let handle = self.service.create_context(hash_algo, hash_param,
                                                 CipherMode::None)?;
        self.actions.push(Action { kind: ActionKind::Hash, handle });
        log::debug!("Hashing the signed data with {}", hash_algo);
        self.content_list.push(item);
        Ok(size)
    }

    /// Sets up decryption once a key is available.
    fn process_encrypted_prefix(&mut self) -> Result<Option<Progress>> {
        let (used, seen) = self.payload.deframe(&self.input, self.eof,
                                                MAX_PREFIX_SIZE,
                                                self.segments_left)?;
        self.input.drain(..used);
        self.segments_left -= seen;
        if self.payload.body.len() < MAX_PREFIX_SIZE
            && ! self.payload.body_done
        {
            if self.segments_left == 0 {
                return Ok(Some(Progress::Continue));
            }
            return Err(Error::Underflow.into());
        }

        let crypt = match self.action(ActionKind::Crypt) {
            Some(h) => h,
            None => {
                if self.content_list.is_empty() {
                    // PGP 2 encrypted data without a session key packet.
                    self.content_list.push(ContentListItem::pgp2_password());
                }
                let need = self.content_list.iter()
                    .find(|i| i.encr_info().is_some())
                    .map(|i| i.env_info())
                    .unwrap_or(EnvInfo::Password);
                log::debug!("Waiting for a {}", need);
                return Ok(Some(Progress::NeedResource(need)));
            }
        };

        let block_size = self.service.get_attribute(crypt, Attribute::IvSize)?
            .size()?;
        let prefix = block_size + 2;
        if self.payload.body.len() < prefix {
            return Err(bad_data!("Encrypted data of {} bytes is too short for \
                                  the {} byte prefix",
                                 self.payload.body.len(), prefix));
        }

        let mdc = if self.state == State::EncrMdc {
            Some(self.service.create_context(Algorithm::SHA1, 0,
                                             CipherMode::None)?)
        } else {
            None
        };
        if let Err(e) = self.service.process_iv(
            crypt, &self.payload.body[..prefix], mdc)
        {
            if let Some(h) = mdc {
                self.release_context(h);
            }
            if let Some(Error::WrongKey) = crate::error_kind(&e) {
                log::debug!("Quick check failed, withdrawing the key");
                self.withdraw(ActionKind::Crypt);
            }
            return Err(e);
        }
        if let Some(handle) = mdc {
            self.actions.push(Action { kind: ActionKind::Mdc, handle });
            self.payload.holdback = MDC_PACKET_SIZE;
        }
        self.payload.body.drain(..prefix);
        self.set_state(State::Data);
        Ok(None)
    }

    fn process_data_header(&mut self) -> Result<Option<Progress>> {
        match self.usage {
            Usage::Sign => {
                self.read_signed_literal()?;
                Ok(None)
            }
            Usage::Crypt | Usage::Compress => self.read_inner_header()
                .context("Invalid PGP encapsulated content header"),
            Usage::None => Err(Error::Internal(
                "Data header without an outer packet".into()).into()),
        }
    }

    /// Reads the literal data packet that follows a signature.
    fn read_signed_literal(&mut self) -> Result<()> {
        tracer!("Envelope::read_signed_literal");

        let mut s = Stream::new(&self.input);
        let header = packet::read_packet_header(&mut s, 1, u32::MAX as usize,
                                                true)?;
        if header.tag() != Tag::Literal {
            return Err(bad_data!("Expected literal data after the signature, \
                                  got a {}", header.tag()));
        }
        let used = skip_literal_fields(&mut s)?;
        let framing = literal_framing(header.length(), used)?;
        t!("Signed literal data, {:?}", framing);
        self.payload.start(framing);
        self.payload.hashing = true;
        self.content_type = ContentType::Data;
        self.version = self.version.max(header.version());
        self.input.drain(..s.tell());
        self.set_state(State::Done);
        Ok(())
    }

    /// Reads the header at the start of the plaintext.
    fn read_inner_header(&mut self) -> Result<Option<Progress>> {
        let capped = self.pump()?;

        let inner = if self.payload.segmented {
            log::debug!("Partial body lengths, passing the content through");
            Inner::Partial
        } else {
            match classify(&self.payload.plain) {
                Ok(inner) => inner,
                Err(e) if is_underflow(&e) => {
                    if self.plain_complete() {
                        return Err(bad_data!(
                            "Truncated encapsulated content of {} bytes",
                            self.payload.plain.len()));
                    }
                    if capped {
                        return Ok(Some(Progress::Continue));
                    }
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        };
        log::debug!("Encapsulated content: {:?}", inner);

        match inner {
            Inner::Literal { strip, left } => {
                self.release(strip, false)?;
                self.payload.inner_left = left;
                self.content_type = ContentType::Data;
            }
            // The data is handed on with its framing for another
            // envelope to take apart.
            Inner::Partial =>
                self.content_type = ContentType::CompressedData,
            Inner::Nested(content_type) =>
                self.content_type = content_type,
        }
        self.set_state(State::Done);
        Ok(None)
    }

    /// Runs the payload through the pipeline.
    pub(super) fn process_payload(&mut self) -> Result<Option<Progress>> {
        let buffer_size = self.config.get_buffer_size();
        loop {
            if ! self.detached && self.pending() >= buffer_size {
                return Ok(Some(Progress::Continue));
            }

            let before = (self.input.len(), self.payload.plain.len(),
                          self.pending());
            let capped = self.pump()?;
            self.release_available()?;

            if self.plain_complete() {
                let mut releasable = self.payload.plain.len()
                    .saturating_sub(self.payload.holdback);
                if let Some(left) = self.payload.inner_left {
                    releasable = releasable.min(left as usize);
                }
                if releasable > 0 {
                    // Waiting for the caller to make room.
                    return Ok(Some(Progress::Continue));
                }
                if let Some(left) = self.payload.inner_left {
                    if left > 0 {
                        return Err(bad_data!(
                            "Truncated literal data, {} bytes missing", left));
                    }
                }
                self.process_postamble()?;
                self.finished = true;
                log::debug!("Finished, {} bytes to pop", self.pending());
                return Ok(Some(Progress::Finished));
            }

            if capped {
                return Ok(Some(Progress::Continue));
            }
            let after = (self.input.len(), self.payload.plain.len(),
                         self.pending());
            if before == after {
                // At the end of the input this reports a truncated
                // message to `flush`.
                return Err(Error::Underflow.into());
            }
        }
    }

    /// Checks what follows the payload.
    fn process_postamble(&mut self) -> Result<()> {
        if self.action(ActionKind::Mdc).is_some() {
            self.check_mdc()?;
            self.withdraw(ActionKind::Mdc);
            self.payload.holdback = 0;
        } else if ! self.payload.plain.is_empty() {
            log::warn!("Ignoring {} bytes after the literal data",
                       self.payload.plain.len());
            let n = self.payload.plain.len();
            self.release(n, false)?;
        }

        if self.usage == Usage::Sign {
            self.complete_signature()?;
        }

        if ! self.input.is_empty() {
            log::warn!("Ignoring {} bytes after the end of the message",
                       self.input.len());
            self.input.clear();
        }
        Ok(())
    }

    /// Reads the trailing signature of a one-pass signed message,
    /// then computes the digest the signature has to match.
    fn complete_signature(&mut self) -> Result<()> {
        tracer!("Envelope::complete_signature");

        let idx = self.content_list.iter()
            .position(|i| i.sig_info().is_some())
            .ok_or_else(|| Error::Internal("No signature item".into()))?;

        if self.content_list[idx].object().is_empty() {
            let mut s = Stream::new(&self.input);
            let header = packet::read_packet_header(&mut s.clone(), 0,
                                                    u32::MAX as usize, true)
                .context("Invalid PGP signature packet header")?;
            if header.tag() != Tag::Signature {
                return Err(bad_data!("Expected a signature after the \
                                      one-pass signed data, got a {}",
                                     header.tag()));
            }
            self.check_object_size(&header)?;
            let info = signature::pgp::read_with_limit(
                &mut s, self.config.get_max_subpackets())
                .context("Invalid PGP signature packet")?;
            let object = self.input[..info.size].to_vec();
            self.content_list[idx].complete_signature(&object, &info)?;
            self.version = self.version.max(header.version());
            self.input.drain(..info.size);
            t!("Trailing signature of {} bytes", info.size);
        }

        let hash = self.action(ActionKind::Hash).ok_or_else(||
            Error::Internal("Signature without a hash context".into()))?;
        let item = &self.content_list[idx];
        let (version, attributes) = match item.sig_info() {
            Some(sig) => (sig.version, sig.attributes),
            None => return Err(Error::Internal(
                "Not a signature item".into()).into()),
        };
        let mut hashed = attributes.slice(item.object())?.to_vec();
        if version == 4 {
            let len = hashed.len() as u32;
            hashed.extend_from_slice(&V4_TRAILER);
            hashed.extend_from_slice(&len.to_be_bytes());
        }
        let h = self.service.clone_context(hash)?;
        let digest = self.service.hash_update(h, &hashed)
            .and_then(|_| self.service.hash_finalize(h));
        self.service.release_context(h)?;
        let digest = digest?;
        self.withdraw(ActionKind::Hash);
        self.payload.hashing = false;

        let sig = self.content_list[idx].sig_info_mut().ok_or_else(||
            Error::Internal("Not a signature item".into()))?;
        sig.hash_check_ok = sig.hash_check
            .map(|c| digest.starts_with(&c))
            .unwrap_or(false);
        if ! sig.hash_check_ok {
            log::warn!("The signature's hash check bytes don't match the \
                        data");
        }
        sig.digest = Some(digest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_fields() {
        let body = [b'b', 3, b'f', b'o', b'o', 0, 0, 0, 0, b'x'];
        let mut s = Stream::new(&body);
        assert_eq!(skip_literal_fields(&mut s).unwrap(), 9);
        // A truncated name is an underflow.
        let mut s = Stream::new(&body[..4]);
        assert!(is_underflow(&skip_literal_fields(&mut s).unwrap_err()));
    }

    #[test]
    fn inner_packets() {
        let literal = [0xCB, 8, b'b', 0, 0, 0, 0, 0, b'h', b'i'];
        assert_eq!(classify(&literal).unwrap(),
                   Inner::Literal { strip: 8, left: Some(2) });
        // Header known, data still to come.
        assert_eq!(classify(&literal[..8]).unwrap(),
                   Inner::Literal { strip: 8, left: Some(2) });
        assert!(is_underflow(&classify(&literal[..5]).unwrap_err()));
        // An empty literal.
        assert!(classify(&[0xCB, 6, b'b', 0, 0, 0, 0, 0]).is_err());

        assert_eq!(classify(&[0xCB, 0xE9, b'b']).unwrap(), Inner::Partial);
        assert_eq!(classify(&[0xC8, 2, 1, 0]).unwrap(),
                   Inner::Nested(ContentType::CompressedData));
        assert_eq!(classify(&[0xC2, 20]).unwrap(),
                   Inner::Nested(ContentType::SignedData));
        assert_eq!(classify(&[0xC1, 20]).unwrap(),
                   Inner::Nested(ContentType::EnvelopedData));
        let e = classify(&[0xCE, 2, 0, 0]).unwrap_err();
        assert!(matches!(crate::error_kind(&e), Some(Error::BadData(_))));
    }
}
