use scil_core::{Datatype, Dims, Preconditioner, Result, UserHints};

use crate::{element_words, push_words, unsupported};

/// Wrapping difference to the previous element, for integer data.
///
/// Runs after a converter, where quantized indices of smooth fields turn
/// into small differences.
pub struct DeltaPreconditioner;

fn width_mask(datatype: Datatype) -> u64 {
    match datatype.size() {
        8 => u64::MAX,
        n => (1u64 << (n * 8)) - 1,
    }
}

impl Preconditioner for DeltaPreconditioner {
    fn supports(&self, datatype: Datatype) -> bool {
        !datatype.is_float()
    }

    fn precondition(
        &self,
        datatype: Datatype,
        _hints: &UserHints,
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<Vec<u8>> {
        if !self.supports(datatype) {
            return Err(unsupported("delta", datatype));
        }
        let mask = width_mask(datatype);
        let words = element_words(src, datatype, dims)?;
        let mut prev = 0u64;
        let deltas = words.into_iter().map(|w| {
            let d = w.wrapping_sub(prev) & mask;
            prev = w;
            d
        });
        push_words(deltas, datatype, dest);
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
        if !self.supports(datatype) {
            return Err(unsupported("delta", datatype));
        }
        let mask = width_mask(datatype);
        let words = element_words(src, datatype, dims)?;
        let mut prev = 0u64;
        let restored = words.into_iter().map(|d| {
            prev = prev.wrapping_add(d) & mask;
            prev
        });
        push_words(restored, datatype, dest);
        Ok(())
    }
}
