//! Incremental decompression of compressed data packets.
//!
//! See [Section 9.3 of RFC 4880] for the algorithm identifiers.
//!
//!   [Section 9.3 of RFC 4880]: https://tools.ietf.org/html/rfc4880#section-9.3

use std::fmt;

use crate::Error;
use crate::Result;

/// How much output space is added per round.
#[allow(dead_code)]
const CHUNK: usize = 8192;

/// A streaming decompressor.
pub(crate) enum Decompressor {
    /// ZIP, raw deflate.
    #[cfg(feature = "compression-deflate")]
    Zip(flate2::Decompress),
    /// ZLIB.
    #[cfg(feature = "compression-deflate")]
    Zlib(flate2::Decompress),
    /// BZip2.
    #[cfg(feature = "compression-bzip2")]
    BZip2(bzip2::Decompress),
}

impl fmt::Debug for Decompressor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Decompressor {
    /// Creates a decompressor for the PGP compression algorithm
    /// `algo`.
    pub fn new(algo: u8) -> Result<Self> {
        match algo {
            #[cfg(feature = "compression-deflate")]
            1 => Ok(Decompressor::Zip(flate2::Decompress::new(false))),
            #[cfg(feature = "compression-deflate")]
            2 => Ok(Decompressor::Zlib(flate2::Decompress::new(true))),
            #[cfg(feature = "compression-bzip2")]
            3 => Ok(Decompressor::BZip2(bzip2::Decompress::new(false))),
            a => Err(Error::NotAvailable(
                format!("Compression algorithm {}", a)).into()),
        }
    }

    /// Returns the algorithm's name.
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "compression-deflate")]
            Decompressor::Zip(_) => "ZIP",
            #[cfg(feature = "compression-deflate")]
            Decompressor::Zlib(_) => "ZLIB",
            #[cfg(feature = "compression-bzip2")]
            Decompressor::BZip2(_) => "BZip2",
            #[allow(unreachable_patterns)]
            _ => "none",
        }
    }

    /// Decompresses as much of `input` as possible, appending to
    /// `output` until it holds at least `limit` bytes.
    ///
    /// Returns the number of input bytes consumed and whether the end
    /// of the compressed stream was reached.
    #[allow(unused_variables, unused_mut)]
    pub fn decompress(&mut self, mut input: &[u8], output: &mut Vec<u8>,
                      limit: usize)
                      -> Result<(usize, bool)>
    {
        let total = input.len();
        loop {
            if output.len() >= limit {
                return Ok((total - input.len(), false));
            }
            output.reserve(CHUNK);

            let (used, produced, end) = match self {
                #[cfg(feature = "compression-deflate")]
                Decompressor::Zip(d) | Decompressor::Zlib(d) => {
                    let (i, o) = (d.total_in(), d.total_out());
                    let status = d.decompress_vec(
                        input, output, flate2::FlushDecompress::None)
                        .map_err(|e| Error::BadData(
                            format!("Invalid zlib compressed content: {}", e)))?;
                    ((d.total_in() - i) as usize, d.total_out() - o,
                     status == flate2::Status::StreamEnd)
                }
                #[cfg(feature = "compression-bzip2")]
                Decompressor::BZip2(d) => {
                    let (i, o) = (d.total_in(), d.total_out());
                    let status = d.decompress_vec(input, output)
                        .map_err(|e| Error::BadData(
                            format!("Invalid bzip2 compressed content: {}", e)))?;
                    ((d.total_in() - i) as usize, d.total_out() - o,
                     status == bzip2::Status::StreamEnd)
                }
                #[allow(unreachable_patterns)]
                _ => return Err(Error::NotAvailable(
                    "Decompression support".into()).into()),
            };

            input = &input[used..];
            if end {
                return Ok((total - input.len(), true));
            }
            if used == 0 && produced == 0 {
                return Ok((total - input.len(), false));
            }
        }
    }
}

#[cfg(all(test, feature = "compression-deflate"))]
mod tests {
    use super::*;
    use std::io::Write;

    fn deflate(data: &[u8], zlib: bool) -> Vec<u8> {
        if zlib {
            let mut e = flate2::write::ZlibEncoder::new(
                Vec::new(), flate2::Compression::default());
            e.write_all(data).unwrap();
            e.finish().unwrap()
        } else {
            let mut e = flate2::write::DeflateEncoder::new(
                Vec::new(), flate2::Compression::default());
            e.write_all(data).unwrap();
            e.finish().unwrap()
        }
    }

    #[test]
    fn piecewise() {
        let data: Vec<u8> = (0..50000u32).map(|i| (i % 251) as u8).collect();
        for (algo, zlib) in &[(1, false), (2, true)] {
            let compressed = deflate(&data, *zlib);
            let mut d = Decompressor::new(*algo).unwrap();
            let mut out = Vec::new();
            let mut end = false;
            for chunk in compressed.chunks(7) {
                let mut chunk = chunk;
                while !chunk.is_empty() {
                    let (used, e) = d.decompress(chunk, &mut out, usize::MAX)
                        .unwrap();
                    chunk = &chunk[used..];
                    end = e;
                    if end {
                        break;
                    }
                }
            }
            assert!(end, "{}", d.name());
            assert_eq!(out, data);
        }
    }

    #[test]
    fn limit() {
        let data = vec![0u8; 100000];
        let compressed = deflate(&data, false);
        let mut d = Decompressor::new(1).unwrap();
        let mut out = Vec::new();
        let (used, end) = d.decompress(&compressed, &mut out, 1000).unwrap();
        assert!(!end);
        assert!(out.len() >= 1000 && out.len() < data.len());
        out.clear();
        d.decompress(&compressed[used..], &mut out, usize::MAX).unwrap();
    }

    #[test]
    fn garbage() {
        let mut d = Decompressor::new(2).unwrap();
        let e = d.decompress(&[0xFF; 16], &mut Vec::new(), usize::MAX)
            .unwrap_err();
        assert!(matches!(e.downcast_ref::<Error>(), Some(Error::BadData(_))));
    }

    #[test]
    fn unknown() {
        assert!(Decompressor::new(0).is_err());
        assert!(Decompressor::new(110).is_err());
    }
}
