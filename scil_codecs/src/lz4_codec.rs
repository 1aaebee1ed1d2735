use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use scil_core::{ByteCompressor, Result};

use crate::codec_error;

/// LZ4 block codec with the uncompressed size prepended.
///
/// Fastest of the bundled byte codecs, which is why the chooser also uses
/// it to measure how random a sample is.
pub struct Lz4Codec;

impl ByteCompressor for Lz4Codec {
    fn compress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()> {
        dest.extend_from_slice(&compress_prepend_size(src));
        Ok(())
    }

    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()> {
        let raw = decompress_size_prepended(src).map_err(|e| codec_error("lz4", e))?;
        dest.extend_from_slice(&raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repetitive_input_shrinks() {
        let raw = vec![7u8; 4096];
        let mut packed = Vec::new();
        Lz4Codec.compress(&raw, &mut packed).unwrap();
        assert!(packed.len() < 100);
        let mut back = Vec::new();
        Lz4Codec.decompress(&packed, &mut back).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let mut out = Vec::new();
        let err = Lz4Codec.decompress(&[10, 0, 0, 0, 0xff], &mut out).unwrap_err();
        assert_eq!(err.code(), scil_core::ErrorCode::UnknownErr);
    }
}
