use scil_core::{Datatype, Dims, Preconditioner, Result, UserHints};

use crate::{element_words, push_words};

/// Replaces every element by the XOR of its bit pattern with the previous
/// element's. Neighbouring floats of similar magnitude share sign, exponent
/// and leading mantissa bits, which turn into runs of zero bytes for the
/// byte compressor behind it.
pub struct XorDeltaPreconditioner;

impl Preconditioner for XorDeltaPreconditioner {
    fn supports(&self, _datatype: Datatype) -> bool {
        true
    }

    fn precondition(
        &self,
        datatype: Datatype,
        _hints: &UserHints,
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<Vec<u8>> {
        let words = element_words(src, datatype, dims)?;
        let mut prev = 0u64;
        let xored = words.into_iter().map(|w| {
            let d = w ^ prev;
            prev = w;
            d
        });
        push_words(xored, datatype, dest);
        Ok(Vec::new())
    }

    fn restore(
        &self,
        datatype: Datatype,
        _header: &[u8],
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<()> {
        let words = element_words(src, datatype, dims)?;
        let mut prev = 0u64;
        let restored = words.into_iter().map(|d| {
            prev ^= d;
            prev
        });
        push_words(restored, datatype, dest);
        Ok(())
    }
}
