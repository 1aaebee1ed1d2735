use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use scil_core::{ByteCompressor, Result};

use crate::codec_error;

/// Gzip (deflate) codec.
pub struct GzipCodec {
    pub level: u32,
}

impl GzipCodec {
    pub const DEFAULT: GzipCodec = GzipCodec { level: 6 };
}

impl ByteCompressor for GzipCodec {
    fn compress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()> {
        let mut enc = GzEncoder::new(&mut *dest, Compression::new(self.level));
        enc.write_all(src).map_err(|e| codec_error("gzip", e))?;
        enc.finish().map_err(|e| codec_error("gzip", e))?;
        Ok(())
    }

    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()> {
        GzDecoder::new(src)
            .read_to_end(dest)
            .map_err(|e| codec_error("gzip", e))?;
        Ok(())
    }
}
