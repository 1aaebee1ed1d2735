//! Absolute-tolerance codec: quantize every value onto a grid of step
//! `1.95 * abs_tol` anchored at the buffer minimum, then bit-pack the codes.
//!
//! ```text
//! [min:f64][step:f64][bits:u8][fill:f64]   25-byte header
//! [packed codes]                           ceil(count * bits / 8) bytes
//! [exact values...]                        raw elements, in order
//! ```
//!
//! The top code is reserved for the fill value when one is configured. If
//! any value must be kept exactly (lossless range, inf, NaN, or a grid point
//! that rounds out of tolerance in the element type) the next code down
//! marks it and the value itself is appended after the packed codes.

use scil_core::bitpack::{pack_into, packed_size, unpack};
use scil_core::datatype::{decode_samples, FloatSample};
use scil_core::format::HeaderReader;
use scil_core::hints::FILL_NONE;
use scil_core::quantizer::{
    bits_needed_with_reserved, min_max_excluding, quantize, reconstructs_within, unquantize,
};
use scil_core::{Datatype, DatatypeCompressor, Dims, Result, ScilError, UserHints};

use crate::{decode_elements, unsupported};

pub const HEADER_SIZE: usize = 25;

/// Grid step relative to the requested tolerance, leaving headroom for
/// floating point rounding in the reconstruction.
const STEP_FACTOR: f64 = 1.95;

pub struct AbstolCodec;

struct Layout {
    fill_code: Option<u64>,
    exact_code: Option<u64>,
}

impl Layout {
    fn new(bits: u8, has_fill: bool, has_exact: bool) -> Self {
        let top = if bits == 0 { 0 } else { (1u64 << bits) - 1 };
        let fill_code = has_fill.then_some(top);
        let exact_code = has_exact.then(|| top.saturating_sub(has_fill as u64));
        Self { fill_code, exact_code }
    }
}

fn compress_typed<T: FloatSample>(
    hints: &UserHints,
    src: &[u8],
    dims: &Dims,
    dest: &mut Vec<u8>,
) -> Result<()> {
    let tol = hints.absolute_tolerance;
    if !(tol > 0.0 && tol < f64::MAX) {
        return Err(ScilError::precision("abstol requires an absolute tolerance"));
    }
    let values = decode_elements::<T>(src, dims)?;
    let step = tol * STEP_FACTOR;
    let half = step / 2.0;

    let has_fill = hints.has_fill_value();
    let is_fill = |v: f64| has_fill && v == hints.fill_value;
    let is_exact = |v: f64| !v.is_finite() || hints.is_exact_point(v);
    let (min, max) = min_max_excluding(values.iter().map(|v| v.to_f64()), is_exact)
        .unwrap_or((0.0, 0.0));
    let keep_exact = |x: f64| is_exact(x) || !reconstructs_within::<T>(x, min, half, tol);
    let has_exact = values.iter().any(|v| {
        let v = v.to_f64();
        keep_exact(v) && !is_fill(v)
    });

    let reserved = has_fill as u64 + has_exact as u64;
    let bits = bits_needed_with_reserved(min, max, half, reserved)?;
    let native_bits = T::DATATYPE.size() * 8;
    if bits as usize >= native_bits {
        return Err(ScilError::precision(format!(
            "abstol needs {bits} bits per value, {} has only {native_bits}",
            T::DATATYPE
        )));
    }
    let layout = Layout::new(bits, has_fill, has_exact);

    let mut exact = Vec::new();
    let codes: Vec<u64> = values
        .iter()
        .map(|&v| {
            let x = v.to_f64();
            match (layout.fill_code, layout.exact_code) {
                (Some(code), _) if is_fill(x) => code,
                (_, Some(code)) if keep_exact(x) => {
                    v.write_le(&mut exact);
                    code
                }
                _ => quantize(x, min, half),
            }
        })
        .collect();

    dest.reserve(HEADER_SIZE + packed_size(codes.len(), bits)? + exact.len());
    dest.extend_from_slice(&min.to_le_bytes());
    dest.extend_from_slice(&step.to_le_bytes());
    dest.push(bits);
    dest.extend_from_slice(&hints.fill_value.to_le_bytes());
    pack_into(&codes, bits, dest)?;
    dest.extend_from_slice(&exact);

    tracing::trace!(min, max, step, bits, exact = exact.len() / T::DATATYPE.size(), "abstol");
    Ok(())
}

fn decompress_typed<T: FloatSample>(src: &[u8], dims: &Dims, dest: &mut Vec<u8>) -> Result<()> {
    let mut header = HeaderReader::new(src);
    let min = header.f64()?;
    let step = header.f64()?;
    let bits = header.u8()?;
    let fill = header.f64()?;
    if bits > scil_core::quantizer::MAX_QUANTIZED_BITS {
        return Err(ScilError::buffer(format!("abstol header claims {bits} bits per value")));
    }

    let count = dims.count();
    let body = header.rest();
    let packed = packed_size(count, bits)?;
    let codes = unpack(body, count, bits)?;
    let exact = decode_samples::<T>(&body[packed..])?;
    let layout = Layout::new(bits, fill != FILL_NONE, !exact.is_empty());

    let half = step / 2.0;
    let mut exact = exact.into_iter();
    dest.reserve(count * T::DATATYPE.size());
    for code in codes {
        let value = if Some(code) == layout.fill_code {
            T::from_f64(fill)
        } else if Some(code) == layout.exact_code {
            exact
                .next()
                .ok_or_else(|| ScilError::buffer("abstol stream ran out of exact values"))?
        } else {
            T::from_f64(unquantize(code, min, half))
        };
        value.write_le(dest);
    }
    Ok(())
}

impl DatatypeCompressor for AbstolCodec {
    fn supports(&self, datatype: Datatype) -> bool {
        datatype.is_float()
    }

    fn compress(
        &self,
        datatype: Datatype,
        hints: &UserHints,
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<()> {
        match datatype {
            Datatype::Float => compress_typed::<f32>(hints, src, dims, dest),
            Datatype::Double => compress_typed::<f64>(hints, src, dims, dest),
            other => Err(unsupported("abstol", other)),
        }
    }

    fn decompress(
        &self,
        datatype: Datatype,
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<()> {
        match datatype {
            Datatype::Float => decompress_typed::<f32>(src, dims, dest),
            Datatype::Double => decompress_typed::<f64>(src, dims, dest),
            other => Err(unsupported("abstol", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scil_core::datatype::encode_samples;

    fn run<T: FloatSample>(values: &[T], hints: &UserHints) -> Result<(Vec<u8>, Vec<T>)> {
        let dims = Dims::new_1d(values.len());
        let mut src = Vec::new();
        encode_samples(values, &mut src);
        let mut packed = Vec::new();
        AbstolCodec.compress(T::DATATYPE, hints, &src, &dims, &mut packed)?;
        let mut out = Vec::new();
        AbstolCodec.decompress(T::DATATYPE, &packed, &dims, &mut out)?;
        Ok((packed, decode_samples(&out)?))
    }

    fn tol(t: f64) -> UserHints {
        UserHints { absolute_tolerance: t, ..UserHints::default() }
    }

    #[test]
    fn integers_within_unit_tolerance() {
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        let (packed, back) = run(&values, &tol(1.0)).unwrap();
        // step 1.95 over a range of 9 -> 6 codes -> 3 bits
        assert_eq!(packed[16], 3);
        assert_eq!(packed.len(), HEADER_SIZE + 4);
        for (a, b) in values.iter().zip(&back) {
            assert!((a - b).abs() <= 1.0, "{a} -> {b}");
        }
    }

    #[test]
    fn header_layout() {
        let (packed, _) = run(&[2.0f64, 4.0], &tol(0.5)).unwrap();
        assert_eq!(f64::from_le_bytes(packed[0..8].try_into().unwrap()), 2.0);
        assert_eq!(f64::from_le_bytes(packed[8..16].try_into().unwrap()), 0.975);
        assert_eq!(f64::from_le_bytes(packed[17..25].try_into().unwrap()), FILL_NONE);
    }

    #[test]
    fn constant_buffer_needs_no_payload() {
        let (packed, back) = run(&[3.25f32; 64], &tol(0.01)).unwrap();
        assert_eq!(packed[16], 0);
        assert_eq!(packed.len(), HEADER_SIZE);
        assert!(back.iter().all(|&v| v == 3.25));
    }

    #[test]
    fn tiny_tolerance_is_a_precision_error() {
        let values = [-1e10f64, 0.0, 1e10];
        assert!(matches!(run(&values, &tol(1e-300)), Err(ScilError::Precision(_))));
        // fits into 53 bits but not below the 32 bits of a float
        let floats = [0.0f32, 1e6];
        assert!(matches!(run(&floats, &tol(1e-6)), Err(ScilError::Precision(_))));
    }

    #[test]
    fn missing_tolerance_is_a_precision_error() {
        assert!(matches!(run(&[1.0f64, 2.0], &UserHints::default()), Err(ScilError::Precision(_))));
    }

    #[test]
    fn fill_and_exact_values_survive() {
        let hints = UserHints {
            absolute_tolerance: 0.1,
            fill_value: -999.0,
            lossless_data_range_from: 1e6,
            ..UserHints::default()
        };
        let values = [1.0f64, -999.0, 2.5, 3e6, f64::INFINITY, 2.0, -999.0];
        let (_, back) = run(&values, &hints).unwrap();
        assert_eq!(back[1], -999.0);
        assert_eq!(back[6], -999.0);
        assert_eq!(back[3], 3e6);
        assert_eq!(back[4], f64::INFINITY);
        for i in [0, 2, 5] {
            assert!((back[i] - values[i]).abs() <= 0.1);
        }
    }

    #[test]
    fn float_rounding_stays_within_tolerance() {
        // tolerance just above half a float step: the f64 grid point can
        // round to the neighbouring float
        let ulp = f64::from(f32::EPSILON);
        let t = ulp / 1.9;
        let values: Vec<f32> = (0..200).map(|n| 1.0 + n as f32 * f32::EPSILON).collect();
        let (_, back) = run(&values, &tol(t)).unwrap();
        for (a, b) in values.iter().zip(&back) {
            assert!((f64::from(*a) - f64::from(*b)).abs() <= t, "{a} -> {b}");
        }
    }

    #[test]
    fn integers_are_rejected() {
        let mut out = Vec::new();
        let err = AbstolCodec
            .compress(Datatype::Int32, &tol(1.0), &[0; 4], &Dims::new_1d(1), &mut out)
            .unwrap_err();
        assert!(matches!(err, ScilError::InvalidChain(_)));
    }
}
