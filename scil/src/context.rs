//! Compression context: datatype, resolved hints and the chain in use.

use scil_core::hints::{
    bits_from_decimals, decimals_from_bits, DBL_FINEST, DBL_IGNORE, INT_FINEST, INT_IGNORE,
};
use scil_core::{Datatype, Result, UserHints};

use crate::chain::Chain;

/// Everything needed to compress buffers of one datatype under one set of
/// hints.
///
/// The hints are resolved once at creation. The chain is either forced at
/// creation or picked by the chooser on the first compress call, and never
/// changes afterwards.
#[derive(Debug, Clone)]
pub struct CompressionContext {
    datatype: Datatype,
    hints: UserHints,
    lossless_needed: bool,
    chain: Option<Chain>,
}

impl CompressionContext {
    /// Resolve `hints` for `datatype` and parse a forced chain, if any.
    pub fn new(datatype: Datatype, hints: &UserHints) -> Result<Self> {
        let mut resolved = hints.clone();
        clamp_precision(datatype, &mut resolved);
        reconcile_bits_and_digits(&mut resolved);

        let lossless_needed = requires_lossless(&resolved);
        for field in [
            &mut resolved.relative_tolerance_percent,
            &mut resolved.relative_err_finest_abs_tolerance,
            &mut resolved.absolute_tolerance,
        ] {
            if *field == DBL_IGNORE {
                *field = f64::MAX;
            }
        }

        let chain = match &resolved.force_compression_methods {
            Some(spec) => Some(Chain::parse(spec)?),
            None => None,
        };
        tracing::debug!(
            %datatype,
            lossless_needed,
            chain = chain.as_ref().map(|c| c.to_string()),
            "compression context created"
        );

        Ok(Self { datatype, hints: resolved, lossless_needed, chain })
    }

    #[inline]
    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    /// The hints after resolution: precision clamped, bits and digits
    /// reconciled, ignored tolerances replaced by `f64::MAX`.
    pub fn effective_hints(&self) -> &UserHints {
        &self.hints
    }

    #[inline]
    pub fn lossless_needed(&self) -> bool {
        self.lossless_needed
    }

    pub fn chain(&self) -> Option<&Chain> {
        self.chain.as_ref()
    }

    /// Install `chain` unless one is already set. Returns whether it was
    /// installed.
    pub(crate) fn set_chain(&mut self, chain: Chain) -> bool {
        if self.chain.is_some() {
            return false;
        }
        self.chain = Some(chain);
        true
    }

    pub(crate) fn require_lossless(&mut self) {
        self.lossless_needed = true;
    }
}

/// Precision beyond what the type carries means "finest".
fn clamp_precision(datatype: Datatype, hints: &mut UserHints) {
    let max_bits = datatype.mantissa_bits().map_or(52, i32::from);
    let max_digits = datatype.max_significant_digits().unwrap_or(15);
    if hints.significant_digits > max_digits || hints.significant_bits > max_bits {
        hints.significant_digits = INT_FINEST;
        hints.significant_bits = INT_FINEST;
    }
}

/// Derive each of bits and digits from the other, keeping the finer one.
fn reconcile_bits_and_digits(hints: &mut UserHints) {
    if hints.significant_digits != INT_IGNORE {
        hints.significant_bits =
            hints.significant_bits.max(bits_from_decimals(hints.significant_digits));
    }
    if hints.significant_bits != INT_IGNORE {
        let digits = decimals_from_bits(hints.significant_bits);
        hints.significant_digits = if hints.significant_digits == INT_IGNORE {
            digits
        } else {
            digits.max(hints.significant_digits)
        };
    }
}

fn requires_lossless(hints: &UserHints) -> bool {
    let finest = |v: f64| v != DBL_IGNORE && v <= DBL_FINEST;
    finest(hints.absolute_tolerance)
        || finest(hints.relative_err_finest_abs_tolerance)
        || finest(hints.relative_tolerance_percent)
        || hints.significant_digits == INT_FINEST
        || hints.significant_bits == INT_FINEST
}
