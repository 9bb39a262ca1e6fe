//! De-enveloping messages with nested layers.
//!
//! A message may be compressed inside an encryption layer, or signed
//! inside a compression layer.  [`open`] takes a message apart layer
//! by layer until it reaches the data, and reports what each layer
//! contained.
//!
//!   [`open`]: fn.open.html

use anyhow::Context;

use crate::Error;
use crate::Result;
use crate::config::Config;
use crate::crypto::Password;
use crate::envelope::{ContentListItem, EnvInfo, Envelope, Progress};
use crate::types::{ContentType, Usage};

/// What one layer of a message contained.
#[derive(Clone, Debug)]
pub struct Layer {
    /// What the layer did to its payload.
    pub usage: Usage,
    /// The type of the layer's payload.
    pub content_type: ContentType,
    /// The PGP version the layer was written with.
    pub version: u8,
    /// The layer's session key and signature objects.
    pub content_list: Vec<ContentListItem>,
}

/// A de-enveloped message.
#[derive(Clone, Debug)]
pub struct Message {
    layers: Vec<Layer>,
    payload: Vec<u8>,
}

impl Message {
    /// Returns the layers, outermost first.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the data.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the data, consuming the message.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// De-envelopes `input`, trying `passwords` on encrypted layers.
///
/// # Examples
///
/// ```
/// # fn main() -> sequoia_envelope::Result<()> {
/// use sequoia_envelope::{open, Config, ContentType};
///
/// let message = [0xcb, 0x08, b'b', 0, 0, 0, 0, 0, b'h', b'i'];
/// let m = open(&message, &[], &Config::default())?;
/// assert_eq!(m.payload(), b"hi");
/// assert_eq!(m.layers().len(), 1);
/// assert_eq!(m.layers()[0].content_type, ContentType::Data);
/// # Ok(()) }
/// ```
pub fn open(input: &[u8], passwords: &[Password], config: &Config)
            -> Result<Message>
{
    open_with(input, config, |_| Ok(passwords.to_vec()))
}

/// De-envelopes `input`, asking `get_passwords` for passwords when an
/// encrypted layer needs one.
///
/// `get_passwords` is given the layer's content list.  Each of the
/// returned passwords is tried in turn.
pub fn open_with<F>(input: &[u8], config: &Config, mut get_passwords: F)
                    -> Result<Message>
    where F: FnMut(&[ContentListItem]) -> Result<Vec<Password>>
{
    tracer!("message::open");

    let mut layers: Vec<Layer> = Vec::new();
    let mut data = input.to_vec();
    loop {
        if layers.len() == config.get_max_nesting() {
            return Err(bad_data!("More than {} nested layers",
                                 config.get_max_nesting()));
        }
        let (layer, payload) =
            open_layer(&data, config, &mut get_passwords)
            .with_context(|| format!("Layer {}", layers.len()))?;
        t!("Layer {}: {:?} {}, {} bytes", layers.len(), layer.usage,
           layer.content_type, payload.len());

        let done = layer.content_type == ContentType::Data;
        layers.push(layer);
        data = payload;
        if done {
            return Ok(Message { layers, payload: data });
        }
    }
}

fn open_layer<F>(input: &[u8], config: &Config, get_passwords: &mut F)
                 -> Result<(Layer, Vec<u8>)>
    where F: FnMut(&[ContentListItem]) -> Result<Vec<Password>>
{
    let mut e = Envelope::new(config.clone());
    let mut output = Vec::new();
    let mut buf = vec![0; 8192];
    let mut data = input;
    let mut flushed = false;

    loop {
        let progress = if ! data.is_empty() {
            let pushed = e.push(data)?;
            if pushed.consumed == 0 && pushed.progress == Progress::NeedData {
                return Err(Error::Internal(
                    "Envelope takes no input but needs more".into()).into());
            }
            data = &data[pushed.consumed..];
            pushed.progress
        } else if ! flushed {
            flushed = true;
            e.flush()?
        } else {
            e.resume()?
        };

        match progress {
            Progress::NeedResource(EnvInfo::Password) =>
                supply_password(&mut e, get_passwords)?,
            Progress::NeedResource(info) =>
                return Err(Error::NotAvailable(
                    format!("De-enveloping with a {}", info)).into()),
            _ => (),
        }

        loop {
            let n = e.pop(&mut buf)?;
            if n == 0 {
                break;
            }
            output.extend_from_slice(&buf[..n]);
        }

        if flushed && e.is_finished() && e.pending() == 0 {
            break;
        }
    }

    let layer = Layer {
        usage: e.usage(),
        content_type: e.content_type(),
        version: e.version(),
        content_list: e.content_list().to_vec(),
    };
    Ok((layer, output))
}

fn supply_password<F>(e: &mut Envelope, get_passwords: &mut F) -> Result<()>
    where F: FnMut(&[ContentListItem]) -> Result<Vec<Password>>
{
    let passwords = get_passwords(e.content_list())?;
    if passwords.is_empty() {
        return Err(Error::InvalidOperation(
            "The message is encrypted, but no password was given".into())
                   .into());
    }
    for password in &passwords {
        match e.add_password(&password[..]) {
            Ok(_) => return Ok(()),
            Err(err) if matches!(crate::error_kind(&err),
                                 Some(Error::WrongKey)) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(Error::WrongKey.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "compression-deflate")]
    #[test]
    fn nesting_is_bounded() {
        use std::io::Write;
        use crate::packet::{BodyLength, Tag, write_packet_header};

        let mut literal = vec![0xcb, 0x0b, b'b', 0, 0, 0, 0, 0];
        literal.extend_from_slice(b"hello");
        let mut z = flate2::write::DeflateEncoder::new(
            vec![1], flate2::Compression::default());
        z.write_all(&literal).unwrap();
        let body = z.finish().unwrap();
        let mut message = Vec::new();
        write_packet_header(&mut message, Tag::CompressedData,
                            BodyLength::Full(body.len() as u32)).unwrap();
        message.extend_from_slice(&body);

        let config = Config::default().max_nesting(1);
        let err = open(&message, &[], &config).unwrap_err();
        assert!(matches!(crate::error_kind(&err), Some(Error::BadData(_))));

        let m = open(&message, &[], &Config::default()).unwrap();
        assert_eq!(m.layers().len(), 2);
        assert_eq!(m.layers()[0].usage, Usage::Compress);
        assert_eq!(m.payload(), b"hello");
    }

    #[test]
    fn zero_nesting_allows_one_layer() {
        let message = [0xcb, 0x09, b'b', 0, 0, 0, 0, 0, 0xC8, 0x01, 0x01];
        let m = open(&message, &[], &Config::default().max_nesting(0))
            .unwrap();
        assert_eq!(m.payload(), &[0xC8, 0x01, 0x01]);
    }

    #[test]
    fn no_passwords() {
        // PGP 2 style encrypted data without a session key packet.
        let mut message = vec![0xC9, 40];
        message.extend_from_slice(&[0x55; 40]);
        let err = open(&message, &[], &Config::default()).unwrap_err();
        assert!(matches!(crate::error_kind(&err),
                         Some(Error::InvalidOperation(_))));
    }
}
