//! Linear quantization at half-tolerance granularity.
//!
//! `abs_tol` is the error a reconstructed value may have; the quantization
//! step is `2 * abs_tol`, so rounding to the nearest step keeps every value
//! within `abs_tol` of the original.

use crate::datatype::FloatSample;
use crate::error::ScilError;
use crate::Result;

/// Largest code width that still maps exactly onto a double.
pub const MAX_QUANTIZED_BITS: u8 = 53;

/// Bits needed to quantize `[min, max]` with error at most `abs_tol`.
pub fn bits_needed(min: f64, max: f64, abs_tol: f64) -> Result<u8> {
    bits_needed_with_reserved(min, max, abs_tol, 0)
}

/// Like [`bits_needed`], additionally leaving room for `reserved` codes
/// above the largest quantized value.
pub fn bits_needed_with_reserved(min: f64, max: f64, abs_tol: f64, reserved: u64) -> Result<u8> {
    if !abs_tol.is_finite() || abs_tol <= 0.0 {
        return Err(ScilError::precision(format!(
            "quantization needs a positive tolerance, got {abs_tol}"
        )));
    }
    if min.is_nan() || max.is_nan() || max < min {
        return Err(ScilError::buffer(format!("invalid quantization range [{min}, {max}]")));
    }
    let codes = 1.0 + (max - min) / (2.0 * abs_tol) + reserved as f64;
    let bits = codes.log2().ceil();
    if !bits.is_finite() || bits > MAX_QUANTIZED_BITS as f64 {
        return Err(ScilError::precision(format!(
            "range [{min}, {max}] at tolerance {abs_tol} needs more than {MAX_QUANTIZED_BITS} bits"
        )));
    }
    Ok(bits as u8)
}

/// Map `value >= min` to its code. Rounds half away from zero.
#[inline]
pub fn quantize(value: f64, min: f64, abs_tol: f64) -> u64 {
    ((value - min) / (2.0 * abs_tol)).round() as u64
}

#[inline]
pub fn unquantize(code: u64, min: f64, abs_tol: f64) -> f64 {
    min + code as f64 * (2.0 * abs_tol)
}

/// True if the grid point of `value`, stored back as a `T`, is still within
/// `tol` of it. Rounding into a narrow `T` can push a grid point past `tol`.
pub fn reconstructs_within<T: FloatSample>(value: f64, min: f64, abs_tol: f64, tol: f64) -> bool {
    let back = T::from_f64(unquantize(quantize(value, min, abs_tol), min, abs_tol)).to_f64();
    (back - value).abs() <= tol
}

/// Minimum and maximum of the finite values not rejected by `exclude`.
///
/// Returns `None` when every value is excluded.
pub fn min_max_excluding<I, F>(values: I, exclude: F) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
    F: Fn(f64) -> bool,
{
    values
        .into_iter()
        .filter(|v| v.is_finite() && !exclude(*v))
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
