//! Moving the payload through the envelope.
//!
//! Payload bytes pass through three buffers.  The envelope's input
//! holds raw packet bytes; [`Payload::body`] holds the outer packet's
//! body with the length framing removed; [`Payload::plain`] holds the
//! body after decryption or decompression.  From there, bytes are
//! released to the caller, hashed on the way out.

use crate::Error;
use crate::Result;
use crate::crypto::mem;
use crate::envelope::{Envelope, compress::Decompressor};
use crate::envelope::content::ActionKind;
use crate::packet::{self, BodyLength, MDC_PACKET_SIZE};
use crate::stream::Stream;
use crate::types::Usage;

/// How the end of the outer packet's body is found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Framing {
    /// This many body bytes are still to come.
    Definite(u64),
    /// Partial body chunks.  `left` bytes of the current chunk are
    /// still to come; `last` is set for the closing chunk.
    Partial {
        left: u32,
        last: bool,
    },
    /// The body runs until the end of the input.
    Indeterminate,
}

impl Framing {
    /// Returns the framing of a packet with the given length whose
    /// first `used` body bytes have already been consumed.
    pub fn new(length: &BodyLength, used: usize) -> Result<Self> {
        let short = |l: u32| {
            if (l as usize) < used {
                Err(bad_data!("Packet body of {} bytes, expected at least {}",
                              l, used))
            } else {
                Ok(l - used as u32)
            }
        };
        Ok(match *length {
            BodyLength::Full(l) =>
                Framing::Definite(short(l)? as u64),
            BodyLength::Partial(l) =>
                Framing::Partial { left: short(l)?, last: false },
            BodyLength::Indeterminate => Framing::Indeterminate,
        })
    }

    /// Returns whether partial body lengths are involved.
    pub fn is_partial(&self) -> bool {
        matches!(self, Framing::Partial { .. })
    }
}

/// The state of the payload pipeline.
#[derive(Debug)]
pub(crate) struct Payload {
    pub framing: Framing,
    /// Set once a partial body length was seen.
    pub segmented: bool,
    /// The outer packet's body, framing removed.
    pub body: Vec<u8>,
    /// Set once the last body byte has been moved to `body`.
    pub body_done: bool,
    /// The body after decryption or decompression.
    pub plain: Vec<u8>,
    /// Set once nothing more will be added to `plain`.
    pub plain_done: bool,
    pub decompressor: Option<Decompressor>,
    /// If the payload is a literal data packet with a definite
    /// length inside the plaintext, the number of its bytes that
    /// remain to be released.
    pub inner_left: Option<u64>,
    /// Bytes at the end of `plain` that are held back: the MDC
    /// packet.
    pub holdback: usize,
    /// Set while released bytes are fed to the signature hash.
    pub hashing: bool,
}

impl Default for Payload {
    fn default() -> Self {
        Payload {
            framing: Framing::Definite(0),
            segmented: false,
            body: Vec::new(),
            body_done: false,
            plain: Vec::new(),
            plain_done: false,
            decompressor: None,
            inner_left: None,
            holdback: 0,
            hashing: false,
        }
    }
}

impl Payload {
    /// Sets up the framing for a packet.
    pub fn start(&mut self, framing: Framing) {
        self.segmented |= framing.is_partial();
        self.framing = framing;
    }

    /// Moves body bytes from `input` to `self.body`, stopping once
    /// the body holds `limit` bytes.
    ///
    /// Returns the number of input bytes consumed and the number of
    /// partial length headers that were read.  At most `segments`
    /// headers are read.
    pub fn deframe(&mut self, input: &[u8], eof: bool, limit: usize,
                   segments: usize)
                   -> Result<(usize, usize)>
    {
        tracer!("envelope::data::deframe");

        let mut pos = 0;
        let mut seen = 0;
        while ! self.body_done {
            let room = limit.saturating_sub(self.body.len());
            let avail = input.len() - pos;
            match self.framing {
                Framing::Definite(0) | Framing::Partial { left: 0, last: true } =>
                    self.body_done = true,
                Framing::Partial { left: 0, last: false } => {
                    if seen == segments {
                        break;
                    }
                    let mut s = Stream::new(&input[pos..]);
                    let length = match packet::read_partial_length(&mut s) {
                        Ok(l) => l,
                        Err(e) if is_underflow(&e) => break,
                        Err(e) => return Err(e),
                    };
                    t!("Segment of {:?}", length);
                    self.framing = match length {
                        BodyLength::Full(l) =>
                            Framing::Partial { left: l, last: true },
                        BodyLength::Partial(l) =>
                            Framing::Partial { left: l, last: false },
                        BodyLength::Indeterminate => return Err(Error::Internal(
                            "Indeterminate segment length".into()).into()),
                    };
                    pos += s.tell();
                    seen += 1;
                }
                Framing::Definite(n) => {
                    let take = (n as usize).min(avail).min(room);
                    if take == 0 {
                        break;
                    }
                    self.body.extend_from_slice(&input[pos..pos + take]);
                    pos += take;
                    self.framing = Framing::Definite(n - take as u64);
                }
                Framing::Partial { left, last } => {
                    let take = (left as usize).min(avail).min(room);
                    if take == 0 {
                        break;
                    }
                    self.body.extend_from_slice(&input[pos..pos + take]);
                    pos += take;
                    self.framing =
                        Framing::Partial { left: left - take as u32, last };
                }
                Framing::Indeterminate => {
                    let take = avail.min(room);
                    self.body.extend_from_slice(&input[pos..pos + take]);
                    pos += take;
                    if eof && pos == input.len() {
                        self.body_done = true;
                    }
                    break;
                }
            }
        }
        Ok((pos, seen))
    }
}

/// Returns whether `e` asks for more input.
pub(crate) fn is_underflow(e: &anyhow::Error) -> bool {
    matches!(crate::error_kind(e), Some(Error::Underflow))
}

impl Envelope {
    /// Runs the pipeline: deframes the input, then decrypts or
    /// decompresses into `plain`.
    ///
    /// Returns whether the segment cap was hit.
    pub(crate) fn pump(&mut self) -> Result<bool> {
        let limit = self.config.get_buffer_size();
        let (used, seen) = self.payload.deframe(&self.input, self.eof, limit,
                                                self.segments_left)?;
        self.input.drain(..used);
        self.segments_left -= seen;
        let capped = self.segments_left == 0 && ! self.payload.body_done;

        let compressed = self.usage == Usage::Compress;
        if ! self.payload.body.is_empty()
            || (compressed && self.payload.body_done
                && ! self.payload.plain_done)
        {
            self.transform(limit)?;
        }
        // Compressed data is complete at the end of the stream.
        if ! compressed && self.payload.body_done
            && self.payload.body.is_empty()
        {
            self.payload.plain_done = true;
        }
        Ok(capped)
    }

    fn transform(&mut self, limit: usize) -> Result<()> {
        match self.usage {
            Usage::Crypt => {
                let crypt = self.action(ActionKind::Crypt).ok_or_else(||
                    Error::Internal("Decrypting without a key".into()))?;
                let mut body = std::mem::take(&mut self.payload.body);
                self.service.decrypt(crypt, &mut body)?;
                self.payload.plain.extend_from_slice(&body);
            }
            Usage::Compress => {
                let d = self.payload.decompressor.as_mut().ok_or_else(||
                    Error::Internal("Decompressing without a decompressor"
                                    .into()))?;
                if self.payload.plain_done {
                    log::warn!("Ignoring {} bytes after the compressed data",
                               self.payload.body.len());
                    self.payload.body.clear();
                    return Ok(());
                }
                let before = self.payload.plain.len();
                let (used, end) = d.decompress(&self.payload.body,
                                               &mut self.payload.plain,
                                               limit)?;
                self.payload.body.drain(..used);
                if ! end && self.payload.body_done
                    && self.payload.body.is_empty()
                    && self.payload.plain.len() == before
                    && before < limit
                {
                    return Err(bad_data!("{} compressed data ends without \
                                          an end of stream marker", d.name()));
                }
                if end {
                    log::debug!("End of {} compressed data", d.name());
                    self.payload.plain_done = true;
                    if ! self.payload.body.is_empty() {
                        log::warn!("Ignoring {} bytes after the compressed \
                                    data", self.payload.body.len());
                        self.payload.body.clear();
                    }
                }
            }
            Usage::None | Usage::Sign => {
                let body = std::mem::take(&mut self.payload.body);
                self.payload.plain.extend_from_slice(&body);
            }
        }
        Ok(())
    }

    /// Returns whether the payload has been completely moved to
    /// `plain`.
    pub(crate) fn plain_complete(&self) -> bool {
        self.payload.plain_done
    }

    /// Removes `amount` bytes from the front of `plain`, feeding them
    /// to the MDC hash.  If `deliver` is set, they are also fed to
    /// the signature hash and handed to the caller.
    pub(crate) fn release(&mut self, amount: usize, deliver: bool)
                          -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let bytes = &self.payload.plain[..amount];
        if let Some(mdc) = self.action(ActionKind::Mdc) {
            self.service.hash_update(mdc, bytes)?;
        }
        if deliver {
            if self.payload.hashing {
                if let Some(h) = self.action(ActionKind::Hash) {
                    self.service.hash_update(h, bytes)?;
                }
            }
            // Detached signatures hash the data, nothing more.
            if ! self.detached {
                self.output.extend_from_slice(bytes);
            }
        }
        self.payload.plain.drain(..amount);
        Ok(())
    }

    /// Releases what can be released.
    ///
    /// The MDC packet is held back until the end of the plaintext is
    /// known.  A literal packet's length bounds what is delivered.
    pub(crate) fn release_available(&mut self) -> Result<()> {
        let mut amount = self.payload.plain.len()
            .saturating_sub(self.payload.holdback);
        if let Some(left) = self.payload.inner_left {
            amount = amount.min(left as usize);
        }
        if ! self.detached {
            amount = amount.min(self.config.get_buffer_size()
                                .saturating_sub(self.pending()));
        }
        if let Some(left) = self.payload.inner_left.as_mut() {
            *left -= amount as u64;
        }
        self.release(amount, true)
    }

    /// Checks the MDC packet at the end of the plaintext.
    pub(crate) fn check_mdc(&mut self) -> Result<()> {
        let mdc = match self.action(ActionKind::Mdc) {
            Some(h) => h,
            None => return Ok(()),
        };
        let plain_len = self.payload.plain.len();
        if plain_len < MDC_PACKET_SIZE {
            return Err(Error::BadSignature(
                format!("MDC packet is missing or incomplete, expected {} \
                         bytes but got {}", MDC_PACKET_SIZE, plain_len))
                       .into());
        }
        let junk = plain_len - MDC_PACKET_SIZE;
        if junk > 0 {
            log::warn!("Ignoring {} bytes of trailing data before the MDC",
                       junk);
            self.release(junk, false)?;
        }

        let trailer = std::mem::take(&mut self.payload.plain);
        if trailer[..2] != packet::MDC_PACKET_HEADER {
            return Err(bad_data!("Invalid MDC packet header {:02X} {:02X}",
                                 trailer[0], trailer[1]));
        }
        self.service.hash_update(mdc, &trailer[..2])?;
        let digest = self.service.hash_finalize(mdc)?;
        if ! mem::constant_time_eq(&digest, &trailer[2..]) {
            return Err(Error::BadSignature(
                "MDC value doesn't match calculated MDC".into()).into());
        }
        log::debug!("MDC verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(framing: Framing, input: &[u8], eof: bool, segments: usize)
           -> (Payload, usize, usize) {
        let mut p = Payload::default();
        p.start(framing);
        let (used, seen) = p.deframe(input, eof, usize::MAX, segments)
            .unwrap();
        (p, used, seen)
    }

    #[test]
    fn definite() {
        let (p, used, _) = run(Framing::Definite(3), b"abcdef", false, 16);
        assert_eq!(used, 3);
        assert_eq!(p.body, b"abc");
        assert!(p.body_done);

        let (p, used, _) = run(Framing::Definite(10), b"abc", false, 16);
        assert_eq!(used, 3);
        assert!(! p.body_done);
        assert_eq!(p.framing, Framing::Definite(7));
    }

    #[test]
    fn partial() {
        // Two bytes in the first chunk, then a one byte chunk, then a
        // final chunk of three bytes.
        let input = [b'a', b'b', 0xE0, b'c', 3, b'd', b'e', b'f', b'x'];
        let (p, used, seen) =
            run(Framing::Partial { left: 2, last: false }, &input, false, 16);
        assert_eq!(p.body, b"abcdef");
        assert!(p.body_done);
        assert!(p.segmented);
        assert_eq!(used, 8);
        assert_eq!(seen, 2);

        // The segment cap stops deframing.
        let (p, used, seen) =
            run(Framing::Partial { left: 2, last: false }, &input, false, 1);
        assert_eq!(p.body, b"abc");
        assert!(! p.body_done);
        assert_eq!((used, seen), (4, 1));

        // An incomplete length header waits.
        let input = [b'a', b'b', 0xFF, 0, 0];
        let (p, used, _) =
            run(Framing::Partial { left: 2, last: false }, &input, false, 16);
        assert_eq!(used, 2);
        assert_eq!(p.framing, Framing::Partial { left: 0, last: false });
    }

    #[test]
    fn indeterminate() {
        let (p, used, _) = run(Framing::Indeterminate, b"abc", false, 16);
        assert_eq!(used, 3);
        assert!(! p.body_done);
        let (p, _, _) = run(Framing::Indeterminate, b"abc", true, 16);
        assert!(p.body_done);
    }

    #[test]
    fn framing() {
        assert_eq!(Framing::new(&BodyLength::Full(10), 4).unwrap(),
                   Framing::Definite(6));
        assert_eq!(Framing::new(&BodyLength::Partial(512), 12).unwrap(),
                   Framing::Partial { left: 500, last: false });
        assert!(Framing::new(&BodyLength::Full(3), 4).is_err());
        assert_eq!(Framing::new(&BodyLength::Indeterminate, 4).unwrap(),
                   Framing::Indeterminate);
    }
}
