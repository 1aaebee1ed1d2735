use std::fmt;

use scil_core::{determine_accuracy, Dims, Result, UserHints};

use crate::compressor::decompress;
use crate::context::CompressionContext;

/// A requested tolerance the reconstruction did not meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceField {
    /// Lossless mode: the bytes differ.
    Identity,
    AbsoluteTolerance,
    RelativeTolerancePercent,
    RelativeErrFinestAbsTolerance,
    SignificantDigits,
    SignificantBits,
}

impl ToleranceField {
    pub fn name(self) -> &'static str {
        match self {
            ToleranceField::Identity => "identity",
            ToleranceField::AbsoluteTolerance => "absolute_tolerance",
            ToleranceField::RelativeTolerancePercent => "relative_tolerance_percent",
            ToleranceField::RelativeErrFinestAbsTolerance => "relative_err_finest_abs_tolerance",
            ToleranceField::SignificantDigits => "significant_digits",
            ToleranceField::SignificantBits => "significant_bits",
        }
    }
}

impl fmt::Display for ToleranceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Worst accuracy observed over the buffer.
    pub accuracy: UserHints,
    pub failures: Vec<ToleranceField>,
    /// The context required lossless compression, so only identity was
    /// checked.
    pub lossless: bool,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Decompress `compressed` and check it against `original` under the
/// context's hints.
pub fn validate(
    ctx: &CompressionContext,
    original: &[u8],
    dims: &Dims,
    compressed: &[u8],
) -> Result<ValidationReport> {
    let datatype = ctx.datatype();
    let restored = decompress(datatype, dims, compressed)?;
    let wanted = ctx.effective_hints();
    let accuracy =
        determine_accuracy(datatype, original, &restored, wanted.relative_err_finest_abs_tolerance)?;

    let mut failures = Vec::new();
    if ctx.lossless_needed() {
        if restored != original {
            failures.push(ToleranceField::Identity);
        }
    } else {
        let checks = [
            (accuracy.absolute_tolerance > wanted.absolute_tolerance, ToleranceField::AbsoluteTolerance),
            (
                accuracy.relative_tolerance_percent > wanted.relative_tolerance_percent,
                ToleranceField::RelativeTolerancePercent,
            ),
            (
                accuracy.relative_err_finest_abs_tolerance > wanted.relative_err_finest_abs_tolerance,
                ToleranceField::RelativeErrFinestAbsTolerance,
            ),
            (accuracy.significant_digits < wanted.significant_digits, ToleranceField::SignificantDigits),
            (accuracy.significant_bits < wanted.significant_bits, ToleranceField::SignificantBits),
        ];
        failures.extend(checks.into_iter().filter(|(failed, _)| *failed).map(|(_, field)| field));
    }

    for field in &failures {
        tracing::debug!(%field, "validation failed");
    }
    Ok(ValidationReport { accuracy, failures, lossless: ctx.lossless_needed() })
}
