use scil_core::{ByteCompressor, Result};

/// No-op codec: stores bytes verbatim.
///
/// Picked by the chooser for tiny inputs and for data that does not
/// compress, where any real codec would expand it.
pub struct MemcopyCodec;

impl ByteCompressor for MemcopyCodec {
    fn compress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()> {
        dest.extend_from_slice(src);
        Ok(())
    }

    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()> {
        dest.extend_from_slice(src);
        Ok(())
    }
}
