//! Envelope configuration.
//!
//! The defaults are suitable for most uses.  A [`Config`] can be
//! adjusted with its builder methods or read from the environment
//! with [`Config::from_env`].

use std::env;

use anyhow::Context;

use crate::Error;
use crate::Result;

const ENV_BUFFER_SIZE: &str = "SEQUOIA_ENVELOPE_BUFFER_SIZE";
const ENV_MAX_PACKETS: &str = "SEQUOIA_ENVELOPE_MAX_PACKETS";
const ENV_MAX_NESTING: &str = "SEQUOIA_ENVELOPE_MAX_NESTING";

/// The smallest buffer an envelope will work with.
///
/// It has to hold the largest header sequence up to the start of the
/// payload.
pub const MIN_BUFFER_SIZE: usize = 1024;

/// Tunables for de-enveloping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    buffer_size: usize,
    max_packets: usize,
    max_segments: usize,
    max_subpackets: usize,
    max_nesting: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            buffer_size: 32768,
            max_packets: 16,
            max_segments: 16,
            max_subpackets: 50,
            max_nesting: 8,
        }
    }
}

impl Config {
    /// Returns the default configuration overridden by any set
    /// environment variables.
    pub fn from_env() -> Result<Self> {
        let mut c = Config::default();
        if let Some(v) = env_usize(ENV_BUFFER_SIZE)? {
            c = c.buffer_size(v)?;
        }
        if let Some(v) = env_usize(ENV_MAX_PACKETS)? {
            c = c.max_packets(v);
        }
        if let Some(v) = env_usize(ENV_MAX_NESTING)? {
            c = c.max_nesting(v);
        }
        Ok(c)
    }

    /// Sets the size of the envelope buffer.
    ///
    /// Fails if `size` is smaller than [`MIN_BUFFER_SIZE`].
    pub fn buffer_size(mut self, size: usize) -> Result<Self> {
        if size < MIN_BUFFER_SIZE {
            return Err(Error::InvalidArgument(
                format!("buffer size {} is below the minimum of {}",
                        size, MIN_BUFFER_SIZE)).into());
        }
        self.buffer_size = size;
        Ok(self)
    }

    /// Sets the number of packets the preamble may process before
    /// the data is rejected.
    pub fn max_packets(mut self, n: usize) -> Self {
        self.max_packets = n.max(1);
        self
    }

    /// Sets the number of segments one push may process.
    pub fn max_segments(mut self, n: usize) -> Self {
        self.max_segments = n.max(1);
        self
    }

    /// Sets the number of signature subpackets that are accepted.
    pub fn max_subpackets(mut self, n: usize) -> Self {
        self.max_subpackets = n.max(1);
        self
    }

    /// Sets how many nested layers `open` unwraps.
    pub fn max_nesting(mut self, n: usize) -> Self {
        self.max_nesting = n.max(1);
        self
    }

    /// Returns the size of the envelope buffer.
    pub fn get_buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns the preamble packet cap.
    pub fn get_max_packets(&self) -> usize {
        self.max_packets
    }

    /// Returns the per-push segment cap.
    pub fn get_max_segments(&self) -> usize {
        self.max_segments
    }

    /// Returns the subpacket cap.
    pub fn get_max_subpackets(&self) -> usize {
        self.max_subpackets
    }

    /// Returns the nesting cap.
    pub fn get_max_nesting(&self) -> usize {
        self.max_nesting
    }
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(v) => v.trim().parse::<usize>()
            .map(Some)
            .with_context(|| format!("{} env var is not a number", name)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e)
            .with_context(|| format!("{} env var is not valid unicode", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let c = Config::default()
            .buffer_size(4096).unwrap()
            .max_packets(4)
            .max_nesting(0);
        assert_eq!(c.get_buffer_size(), 4096);
        assert_eq!(c.get_max_packets(), 4);
        assert_eq!(c.get_max_nesting(), 1);
        assert!(Config::default().buffer_size(10).is_err());
    }

    #[test]
    fn environment() {
        env::set_var(ENV_MAX_NESTING, "3");
        let c = Config::from_env().unwrap();
        assert_eq!(c.get_max_nesting(), 3);
        env::set_var(ENV_MAX_NESTING, "three");
        let e = Config::from_env().unwrap_err();
        assert!(format!("{}", e).contains(ENV_MAX_NESTING));
        env::remove_var(ENV_MAX_NESTING);
    }
}
