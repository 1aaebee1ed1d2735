use scil_core::{ByteCompressor, Result};

use crate::codec_error;

/// Zstandard codec.
///
/// Best for: final stage behind a preconditioner, where the remaining
/// redundancy is spread across long distances.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl ZstdCodec {
    pub const DEFAULT: ZstdCodec = ZstdCodec { level: 3 };

    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl ByteCompressor for ZstdCodec {
    fn compress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()> {
        let compressed = zstd::bulk::compress(src, self.level).map_err(|e| codec_error("zstd", e))?;
        dest.extend_from_slice(&compressed);
        Ok(())
    }

    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()> {
        // The frame carries its own content size.
        let raw = zstd::decode_all(src).map_err(|e| codec_error("zstd", e))?;
        dest.extend_from_slice(&raw);
        Ok(())
    }
}
