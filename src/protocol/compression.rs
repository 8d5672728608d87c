//! zlib inflate/deflate for compressed frames via flate2.

use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};
use std::io::{Read, Write};

use crate::{BeatsError, Result};

/// Inflates compressed frame payloads with an upper bound on output size.
#[derive(Debug, Clone, Copy)]
pub struct Decompressor {
    limit: usize,
}

impl Decompressor {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Inflate one complete zlib stream.
    ///
    /// Corrupt input and output larger than the configured limit are both
    /// protocol errors.
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        // Read one byte past the limit so an oversized stream is detectable.
        let mut decoder = ZlibDecoder::new(input).take((self.limit as u64).saturating_add(1));
        let mut out = Vec::with_capacity(input.len().saturating_mul(4).min(self.limit));
        decoder.read_to_end(&mut out).map_err(|source| BeatsError::Decompression { source })?;

        if out.len() > self.limit {
            return Err(BeatsError::FrameTooLarge { length: out.len(), limit: self.limit });
        }

        Ok(out)
    }
}

/// Deflate `input` as a single zlib stream.
pub fn compress(input: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(input)?;
    Ok(encoder.finish()?)
}
