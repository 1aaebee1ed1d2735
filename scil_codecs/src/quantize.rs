use scil_core::datatype::{decode_samples, FloatSample, Sample};
use scil_core::format::HeaderReader;
use scil_core::quantizer::{bits_needed, min_max_excluding, quantize, reconstructs_within, unquantize};
use scil_core::{Converter, Datatype, Dims, Result, ScilError, UserHints};

use crate::{decode_elements, unsupported};

/// Same safety margin as the abstol codec.
const STEP_FACTOR: f64 = 1.95;

/// Index of an element equal to the fill value.
pub const FILL_INDEX: i64 = -1;
/// Index of an element kept exactly in the header.
pub const EXACT_INDEX: i64 = -2;

/// Converts floats into `Int64` grid indices `round((x - min) / step)` with
/// `step = 1.95 * abs_tol`.
///
/// ```text
/// header: [min:f64][step:f64][fill:f64][exact values...]
/// ```
///
/// Fill values become [`FILL_INDEX`]. Values in a lossless range, inf, NaN
/// and grid points that round out of tolerance in the element type become
/// [`EXACT_INDEX`] and travel raw in the header, in element order.
pub struct QuantizeConverter;

fn convert_typed<T: FloatSample>(
    hints: &UserHints,
    src: &[u8],
    dims: &Dims,
    dest: &mut Vec<u8>,
) -> Result<Vec<u8>> {
    let tol = hints.absolute_tolerance;
    if !(tol > 0.0 && tol < f64::MAX) {
        return Err(ScilError::precision("quantize requires an absolute tolerance"));
    }
    let values = decode_elements::<T>(src, dims)?;
    let is_fill = |x: f64| hints.has_fill_value() && x == hints.fill_value;
    let is_exact = |x: f64| !x.is_finite() || hints.is_exact_point(x);
    let (min, max) = min_max_excluding(values.iter().map(|v| v.to_f64()), is_exact)
        .unwrap_or((0.0, 0.0));
    let step = tol * STEP_FACTOR;
    let half = step / 2.0;
    // fails with a precision error beyond 53 bits
    bits_needed(min, max, half)?;

    let mut exact = Vec::new();
    dest.reserve(values.len() * 8);
    for v in values {
        let x = v.to_f64();
        let index = if is_fill(x) {
            FILL_INDEX
        } else if is_exact(x) || !reconstructs_within::<T>(x, min, half, tol) {
            v.write_le(&mut exact);
            EXACT_INDEX
        } else {
            quantize(x, min, half) as i64
        };
        index.write_le(dest);
    }
    tracing::trace!(min, max, step, exact = exact.len() / T::DATATYPE.size(), "quantize");

    let mut header = Vec::with_capacity(24 + exact.len());
    header.extend_from_slice(&min.to_le_bytes());
    header.extend_from_slice(&step.to_le_bytes());
    header.extend_from_slice(&hints.fill_value.to_le_bytes());
    header.extend_from_slice(&exact);
    Ok(header)
}

fn revert_typed<T: FloatSample>(
    header: &[u8],
    src: &[u8],
    dims: &Dims,
    dest: &mut Vec<u8>,
) -> Result<()> {
    let mut header = HeaderReader::new(header);
    let min = header.f64()?;
    let half = header.f64()? / 2.0;
    let fill = header.f64()?;
    let mut exact = decode_samples::<T>(header.rest())?.into_iter();
    let indices = decode_elements::<i64>(src, dims)?;
    dest.reserve(indices.len() * T::DATATYPE.size());
    for index in indices {
        let value = match index {
            FILL_INDEX => T::from_f64(fill),
            EXACT_INDEX => exact
                .next()
                .ok_or_else(|| ScilError::buffer("quantize header ran out of exact values"))?,
            i if i >= 0 => T::from_f64(unquantize(i as u64, min, half)),
            other => return Err(ScilError::buffer(format!("invalid quantization index {other}"))),
        };
        value.write_le(dest);
    }
    Ok(())
}

impl Converter for QuantizeConverter {
    fn supports(&self, input: Datatype) -> bool {
        input.is_float()
    }

    fn output_datatype(&self, _input: Datatype) -> Datatype {
        Datatype::Int64
    }

    fn convert(
        &self,
        input: Datatype,
        hints: &UserHints,
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<Vec<u8>> {
        match input {
            Datatype::Float => convert_typed::<f32>(hints, src, dims, dest),
            Datatype::Double => convert_typed::<f64>(hints, src, dims, dest),
            other => Err(unsupported("quantize", other)),
        }
    }

    fn revert(
        &self,
        input: Datatype,
        header: &[u8],
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<()> {
        match input {
            Datatype::Float => revert_typed::<f32>(header, src, dims, dest),
            Datatype::Double => revert_typed::<f64>(header, src, dims, dest),
            other => Err(unsupported("quantize", other)),
        }
    }
}
