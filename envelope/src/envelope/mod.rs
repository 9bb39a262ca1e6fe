//! Incremental de-enveloping of PGP messages.
//!
//! An [`Envelope`] is fed a message in arbitrary pieces with
//! [`push`], and hands out the payload with [`pop`].  Between those
//! calls it keeps its place in the message, so that input can arrive
//! one byte at a time.  When it needs something other than more
//! input, such as a password, it says so through [`Progress`].
//!
//! The envelope unwraps one layer.  If the payload is itself signed,
//! encrypted or compressed, [`content_type`] says so and the payload
//! has to go through another envelope; [`message::open`] does that.
//!
//!   [`Envelope`]: struct.Envelope.html
//!   [`push`]: struct.Envelope.html#method.push
//!   [`pop`]: struct.Envelope.html#method.pop
//!   [`Progress`]: enum.Progress.html
//!   [`content_type`]: struct.Envelope.html#method.content_type
//!   [`message::open`]: ../message/fn.open.html

use std::fmt;

use crate::Error;
use crate::Result;
use crate::config::Config;
use crate::crypto::{ContextService, Handle, SoftContextService};
use crate::types::{ContentType, Usage};

mod compress;
mod content;
pub use self::content::{
    ContentListItem,
    EncrInfo,
    EnvInfo,
    ItemInfo,
    SigInfo,
};
use self::content::{Action, ActionKind};
mod data;
use self::data::{is_underflow, Payload};
mod pgp;
mod resource;

/// Where the envelope is in the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Nothing but marker packets seen.
    None,
    /// Reading session key packets.
    EncrHdr,
    /// At an encrypted data packet.
    Encr,
    /// At an encrypted data packet with an MDC.
    EncrMdc,
    /// At the start of the payload.
    Data,
    /// At the header inside the payload.
    DataHeader,
    /// In the payload.
    Done,
}

/// What an envelope needs to make progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Processing stopped with work left: the output buffer is full or
    /// the segment bound was reached.  Pop the output and call
    /// [`Envelope::resume`].
    ///
    ///   [`Envelope::resume`]: struct.Envelope.html#method.resume
    Continue,
    /// More input is needed.
    NeedData,
    /// A key is needed.  Supply it with [`Envelope::add_password`] or
    /// [`Envelope::add_session_key`].
    ///
    ///   [`Envelope::add_password`]: struct.Envelope.html#method.add_password
    ///   [`Envelope::add_session_key`]: struct.Envelope.html#method.add_session_key
    NeedResource(EnvInfo),
    /// The message has been processed.  What is left to pop is the
    /// rest of the payload.
    Finished,
}

/// The result of [`Envelope::push`].
///
///   [`Envelope::push`]: struct.Envelope.html#method.push
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pushed {
    /// How many bytes were taken.
    pub consumed: usize,
    /// What the envelope needs next.
    pub progress: Progress,
}

/// A PGP de-enveloping session.
///
/// # Examples
///
/// Input can be fed in pieces of any size:
///
/// ```
/// # fn main() -> sequoia_envelope::Result<()> {
/// use sequoia_envelope::{Config, ContentType, Envelope, Progress};
///
/// let message: &[u8] = &[0xcb, 0x09, b'b', 0, 0, 0, 0, 0, b'h', b'i', b'!'];
/// let mut envelope = Envelope::new(Config::default());
/// for b in message {
///     envelope.push(&[*b])?;
/// }
/// assert_eq!(envelope.flush()?, Progress::Finished);
/// assert_eq!(envelope.content_type(), ContentType::Data);
///
/// let mut buf = [0; 16];
/// let n = envelope.pop(&mut buf)?;
/// assert_eq!(&buf[..n], b"hi!");
/// # Ok(()) }
/// ```
pub struct Envelope {
    config: Config,
    service: Box<dyn ContextService>,

    // Pushed bytes that haven't been processed.
    input: Vec<u8>,
    // Payload waiting to be popped, starting at `output_pos`.
    output: Vec<u8>,
    output_pos: usize,

    state: State,
    usage: Usage,
    content_type: ContentType,
    version: u8,
    packets_seen: usize,
    segments_left: usize,

    content_list: Vec<ContentListItem>,
    actions: Vec<Action>,
    payload: Payload,

    detached: bool,
    eof: bool,
    finished: bool,
    progress: Progress,
    poisoned: Option<String>,
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("state", &self.state)
            .field("usage", &self.usage)
            .field("content_type", &self.content_type)
            .field("version", &self.version)
            .field("input", &self.input.len())
            .field("pending", &self.pending())
            .field("content_list", &self.content_list)
            .field("actions", &self.actions)
            .field("finished", &self.finished)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

impl Envelope {
    /// Creates an envelope using the software context service.
    pub fn new(config: Config) -> Self {
        Self::with_service(config, Box::new(SoftContextService::new()))
    }

    /// Creates an envelope using the given context service.
    pub fn with_service(config: Config, service: Box<dyn ContextService>)
                        -> Self {
        Envelope {
            config,
            service,
            input: Vec::new(),
            output: Vec::new(),
            output_pos: 0,
            state: State::None,
            usage: Usage::None,
            content_type: ContentType::Data,
            version: 0,
            packets_seen: 0,
            segments_left: 0,
            content_list: Vec::new(),
            actions: Vec::new(),
            payload: Payload::default(),
            detached: false,
            eof: false,
            finished: false,
            progress: Progress::NeedData,
            poisoned: None,
        }
    }

    /// Feeds message bytes to the envelope.
    ///
    /// Takes as much of `data` as fits the buffer and processes it.
    /// Bytes that weren't taken have to be pushed again after
    /// popping the output.  Pushing after the message is finished
    /// discards the data.
    pub fn push(&mut self, data: &[u8]) -> Result<Pushed> {
        self.check_usable()?;
        if self.eof {
            return Err(Error::InvalidOperation(
                "Push after flush".into()).into());
        }
        if self.finished {
            if ! data.is_empty() {
                log::warn!("Discarding {} bytes after the end of the message",
                           data.len());
            }
            return Ok(Pushed { consumed: data.len(),
                               progress: Progress::Finished });
        }

        let mut consumed = 0;
        loop {
            let room = self.config.get_buffer_size()
                .saturating_sub(self.input.len());
            let n = room.min(data.len() - consumed);
            self.input.extend_from_slice(&data[consumed..consumed + n]);
            consumed += n;

            let progress = self.run()?;
            if consumed == data.len() || n == 0
                || progress != Progress::NeedData
            {
                return Ok(Pushed { consumed, progress });
            }
        }
    }

    /// Signals the end of the input and completes processing.
    ///
    /// If the message is incomplete, this fails with
    /// `Error::Underflow`; the envelope remains usable and more data
    /// can be pushed.
    pub fn flush(&mut self) -> Result<Progress> {
        self.check_usable()?;
        self.eof = true;
        match self.run() {
            Err(e) if is_underflow(&e) => {
                self.eof = false;
                Err(e)
            }
            r => r,
        }
    }

    /// Continues processing after `Progress::Continue`.
    pub fn resume(&mut self) -> Result<Progress> {
        self.check_usable()?;
        self.run()
    }

    /// Copies payload bytes into `buf`.
    ///
    /// Returns the number of bytes copied, 0 if nothing is available.
    pub fn pop(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_usable()?;
        if self.pending() == 0 && self.progress == Progress::Continue {
            self.run()?;
        }

        let n = buf.len().min(self.pending());
        buf[..n].copy_from_slice(
            &self.output[self.output_pos..self.output_pos + n]);
        self.output_pos += n;
        if self.output_pos == self.output.len() {
            self.output.clear();
            self.output_pos = 0;
        }
        Ok(n)
    }

    /// Copies payload bytes into `buf` without removing them.
    pub fn peek(&self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending());
        buf[..n].copy_from_slice(
            &self.output[self.output_pos..self.output_pos + n]);
        n
    }

    /// Returns the number of payload bytes waiting to be popped.
    pub fn pending(&self) -> usize {
        self.output.len() - self.output_pos
    }

    /// Returns the type of the payload.
    ///
    /// Anything but `ContentType::Data` has to be de-enveloped again.
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Returns what the outer packet does to the payload.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Returns the highest PGP version seen, 2 for PGP 2 and 4 for
    /// OpenPGP.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the session key and signature objects found so far.
    pub fn content_list(&self) -> &[ContentListItem] {
        &self.content_list
    }

    /// Returns whether the message has been completely processed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn check_usable(&self) -> Result<()> {
        match &self.poisoned {
            Some(e) => Err(Error::InvalidOperation(
                format!("Envelope unusable after an earlier error: {}", e))
                           .into()),
            None => Ok(()),
        }
    }

    fn run(&mut self) -> Result<Progress> {
        self.segments_left = self.config.get_max_segments();
        match self.process() {
            Ok(progress) => {
                self.progress = progress;
                Ok(progress)
            }
            Err(e) => {
                match crate::error_kind(&e) {
                    Some(Error::WrongKey) => (),
                    Some(Error::Underflow) if self.eof => (),
                    _ => {
                        log::debug!("Envelope failed: {:#}", e);
                        self.poisoned = Some(format!("{:#}", e));
                    }
                }
                Err(e)
            }
        }
    }

    fn process(&mut self) -> Result<Progress> {
        loop {
            if self.finished {
                return Ok(Progress::Finished);
            }

            let step = if self.state == State::Done {
                self.process_payload()
            } else {
                self.process_preamble()
            };
            match step {
                Ok(Some(progress)) => return Ok(progress),
                Ok(None) => (),
                Err(e) if is_underflow(&e) && ! self.eof =>
                    return Ok(Progress::NeedData),
                Err(e) => return Err(e),
            }
        }
    }

    fn set_state(&mut self, state: State) {
        log::debug!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn action(&self, kind: ActionKind) -> Option<Handle> {
        self.actions.iter().find(|a| a.kind == kind).map(|a| a.handle)
    }

    // Releases a context that isn't recorded as an action.
    fn release_context(&mut self, handle: Handle) {
        if let Err(e) = self.service.release_context(handle) {
            log::warn!("Releasing context {}: {}", handle, e);
        }
    }

    // Removes an action and releases its context.
    fn withdraw(&mut self, kind: ActionKind) {
        if let Some(i) = self.actions.iter().position(|a| a.kind == kind) {
            let a = self.actions.remove(i);
            if let Err(e) = self.service.release_context(a.handle) {
                log::warn!("Releasing {:?} context {}: {}", kind, a.handle, e);
            }
        }
    }
}

impl Drop for Envelope {
    fn drop(&mut self) {
        for a in self.actions.drain(..) {
            if let Err(e) = self.service.release_context(a.handle) {
                log::warn!("Releasing {:?} context {}: {}",
                           a.kind, a.handle, e);
            }
        }
    }
}
