//! Significant-bits codec.
//!
//! Each float is split into sign, exponent and mantissa. The mantissa is
//! rounded to the requested number of bits, the exponent is re-based on the
//! smallest exponent in the buffer and stored in just enough bits for the
//! observed range, and the sign is dropped entirely when all values share it.
//!
//! ```text
//! [signs_id:u8][exponent_bits:u8][mantissa_bits:u8][min_exponent:i16][fill:f64]
//! [fill_mask:u64]                 only if a fill value is configured
//! [packed (sign)(exponent)(mantissa) values]
//! ```

use scil_core::bitpack::{pack_into, unpack};
use scil_core::datatype::FloatSample;
use scil_core::format::HeaderReader;
use scil_core::hints::FILL_NONE;
use scil_core::{Datatype, DatatypeCompressor, Dims, Result, ScilError, UserHints};

use crate::{decode_elements, unsupported};

const SIGNS_POSITIVE: u8 = 0;
const SIGNS_NEGATIVE: u8 = 1;
const SIGNS_MIXED: u8 = 2;

pub struct SigbitsCodec;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Params {
    signs_id: u8,
    exponent_bits: u8,
    mantissa_bits: u8,
    min_exponent: i16,
}

impl Params {
    fn bits_per_value(&self) -> u32 {
        (self.signs_id == SIGNS_MIXED) as u32 + self.exponent_bits as u32 + self.mantissa_bits as u32
    }

    fn encode(&self, sign: u8, exponent_code: u64, mantissa: u64) -> u64 {
        let mut v = exponent_code << self.mantissa_bits | mantissa;
        if self.signs_id == SIGNS_MIXED {
            v |= (sign as u64) << (self.exponent_bits + self.mantissa_bits);
        }
        v
    }

    fn decode(&self, v: u64) -> (u8, u64, u64) {
        let sign = if self.signs_id == SIGNS_MIXED {
            ((v >> (self.exponent_bits + self.mantissa_bits)) & 1) as u8
        } else {
            self.signs_id
        };
        let code = (v >> self.mantissa_bits) & mask(self.exponent_bits as u32);
        (sign, code, v & mask(self.mantissa_bits as u32))
    }
}

#[inline]
fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// `ceil(log2(n))` for `n >= 1`.
fn ceil_log2(n: u32) -> u8 {
    if n <= 1 {
        0
    } else {
        (32 - (n - 1).leading_zeros()) as u8
    }
}

/// Round the mantissa of `v` to `mantissa_bits` bits, half up, carrying
/// into the exponent on overflow.
///
/// Infinity and NaN are truncated instead (a NaN keeps a non-zero
/// mantissa), as is a carry that would turn a finite value into infinity.
fn round_fields<T: FloatSample>(v: T, mantissa_bits: u32) -> (u8, u16, u64) {
    let (sign, exponent, mantissa) = v.fields();
    let shift = T::MANTISSA_BITS - mantissa_bits;
    if shift == 0 {
        return (sign, exponent, mantissa);
    }
    let all_ones = T::exponent_field_max();
    let truncated = mantissa >> shift;
    if exponent == all_ones {
        let keep_nan = mantissa != 0 && truncated == 0 && mantissa_bits > 0;
        return (sign, exponent, if keep_nan { 1 } else { truncated });
    }
    let rounded = (mantissa + (1u64 << (shift - 1))) >> shift;
    if rounded >> mantissa_bits == 0 {
        (sign, exponent, rounded)
    } else if exponent + 1 == all_ones {
        (sign, exponent, truncated)
    } else {
        (sign, exponent + 1, 0)
    }
}

fn compress_typed<T: FloatSample>(
    hints: &UserHints,
    src: &[u8],
    dims: &Dims,
    dest: &mut Vec<u8>,
) -> Result<()> {
    let significant_bits = hints.significant_bits;
    if significant_bits <= 0 {
        return Err(ScilError::precision(
            "sigbits requires a finite number of significant bits",
        ));
    }
    let mantissa_bits = (significant_bits - 1) as u32;
    if mantissa_bits > T::MANTISSA_BITS {
        return Err(ScilError::precision(format!(
            "{significant_bits} significant bits exceed the precision of {}",
            T::DATATYPE
        )));
    }

    let values = decode_elements::<T>(src, dims)?;
    let has_fill = hints.has_fill_value();
    let is_fill = |v: &T| has_fill && v.to_f64() == hints.fill_value;

    let mut signs = (false, false);
    let mut exponents: Option<(u16, u16)> = None;
    for v in values.iter().filter(|v| !is_fill(*v)) {
        let (sign, exponent, _) = v.fields();
        if sign == 0 {
            signs.0 = true;
        } else {
            signs.1 = true;
        }
        exponents = Some(match exponents {
            None => (exponent, exponent),
            Some((lo, hi)) => (lo.min(exponent), hi.max(exponent)),
        });
    }
    let signs_id = match signs {
        (true, true) => SIGNS_MIXED,
        (false, true) => SIGNS_NEGATIVE,
        _ => SIGNS_POSITIVE,
    };
    let (min_exponent, max_exponent) = exponents.unwrap_or((0, 0));
    // +2: one code for the largest exponent, one for a rounding carry out of it
    let exponent_bits = ceil_log2((max_exponent - min_exponent) as u32 + 2);

    let params = Params {
        signs_id,
        exponent_bits,
        mantissa_bits: mantissa_bits as u8,
        min_exponent: min_exponent as i16,
    };
    let bits = params.bits_per_value();
    let native_bits = T::DATATYPE.size() as u32 * 8;
    if bits > native_bits {
        return Err(ScilError::precision(format!(
            "sigbits needs {bits} bits per value, more than the {native_bits} of {}",
            T::DATATYPE
        )));
    }

    let mut used = vec![false; 1usize << exponent_bits];
    let mut codes = Vec::with_capacity(values.len());
    let mut fill_positions = Vec::new();
    for (i, v) in values.iter().enumerate() {
        if is_fill(v) {
            fill_positions.push(i);
            codes.push(0);
            continue;
        }
        let (sign, exponent, mantissa) = round_fields(*v, mantissa_bits);
        let code = (exponent - min_exponent) as u64;
        used[code as usize] = true;
        codes.push(params.encode(sign, code, mantissa));
    }

    let fill_mask = if has_fill {
        let free = used.iter().position(|u| !u).ok_or_else(|| {
            ScilError::precision("no free exponent code left for the fill value")
        })?;
        let fill_mask = (free as u64) << mantissa_bits;
        for &i in &fill_positions {
            codes[i] = fill_mask;
        }
        Some(fill_mask)
    } else {
        None
    };

    dest.push(params.signs_id);
    dest.push(params.exponent_bits);
    dest.push(params.mantissa_bits);
    dest.extend_from_slice(&params.min_exponent.to_le_bytes());
    dest.extend_from_slice(&hints.fill_value.to_le_bytes());
    if let Some(fill_mask) = fill_mask {
        dest.extend_from_slice(&fill_mask.to_le_bytes());
    }
    pack_into(&codes, bits as u8, dest)?;

    tracing::trace!(?params, bits, fills = fill_positions.len(), "sigbits");
    Ok(())
}

fn decompress_typed<T: FloatSample>(src: &[u8], dims: &Dims, dest: &mut Vec<u8>) -> Result<()> {
    let mut header = HeaderReader::new(src);
    let params = Params {
        signs_id: header.u8()?,
        exponent_bits: header.u8()?,
        mantissa_bits: header.u8()?,
        min_exponent: header.i16()?,
    };
    if params.signs_id > SIGNS_MIXED
        || params.mantissa_bits as u32 > T::MANTISSA_BITS
        || params.bits_per_value() > 64
    {
        return Err(ScilError::buffer(format!("corrupt sigbits header {params:?}")));
    }
    let fill = header.f64()?;
    let fill_code = if fill != FILL_NONE {
        Some(header.u64()? >> params.mantissa_bits)
    } else {
        None
    };

    let shift = T::MANTISSA_BITS - params.mantissa_bits as u32;
    let all_ones = T::exponent_field_max() as i64;
    let packed = unpack(header.rest(), dims.count(), params.bits_per_value() as u8)?;
    dest.reserve(packed.len() * T::DATATYPE.size());
    for v in packed {
        let (sign, code, mantissa) = params.decode(v);
        if Some(code) == fill_code {
            T::from_f64(fill).write_le(dest);
            continue;
        }
        let exponent = params.min_exponent as i64 + code as i64;
        if !(0..=all_ones).contains(&exponent) {
            return Err(ScilError::buffer(format!("sigbits exponent {exponent} out of range")));
        }
        T::from_fields(sign, exponent as u16, mantissa << shift).write_le(dest);
    }
    Ok(())
}

impl DatatypeCompressor for SigbitsCodec {
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
            other => Err(unsupported("sigbits", other)),
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
            other => Err(unsupported("sigbits", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use scil_core::datatype::{decode_samples, encode_samples};
    use scil_core::hints::INT_FINEST;

    fn hints(bits: i32) -> UserHints {
        UserHints { significant_bits: bits, ..UserHints::default() }
    }

    fn run<T: FloatSample>(values: &[T], hints: &UserHints) -> Result<(Vec<u8>, Vec<T>)> {
        let dims = Dims::new_1d(values.len());
        let mut src = Vec::new();
        encode_samples(values, &mut src);
        let mut packed = Vec::new();
        SigbitsCodec.compress(T::DATATYPE, hints, &src, &dims, &mut packed)?;
        let mut out = Vec::new();
        SigbitsCodec.decompress(T::DATATYPE, &packed, &dims, &mut out)?;
        Ok((packed, decode_samples(&out)?))
    }

    fn within_bound(x: f64, y: f64, mantissa_bits: i32) -> bool {
        (x - y).abs() <= x.abs() * 2f64.powi(-mantissa_bits)
    }

    #[test]
    fn rounding_half_up_with_carry() {
        // 1.9375 = 1.1111b: 3 mantissa bits round up to 2.0
        assert_eq!(round_fields(1.9375f64, 3), (0, 1024, 0));
        // 1.8125 = 1.1101b -> 1.111b
        assert_eq!(round_fields(1.8125f64, 3), (0, 1023, 0b111));
        // 1.75 stays
        assert_eq!(round_fields(1.75f64, 2), (0, 1023, 0b11));
    }

    #[test]
    fn non_finite_values_truncate() {
        let (_, e, m) = round_fields(f64::INFINITY, 4);
        assert_eq!((e, m), (2047, 0));
        let nan = f64::from_bits(0x7ff0_0000_0000_0001);
        let (_, e, m) = round_fields(nan, 4);
        assert_eq!((e, m), (2047, 1));
        // largest finite never carries into infinity
        let (_, e, _) = round_fields(f64::MAX, 4);
        assert_eq!(e, 2046);
    }

    #[test]
    fn header_layout_positive_values() {
        let (packed, back) = run(&[1.0f64, 2.0, 4.0, 3.0], &hints(4)).unwrap();
        assert_eq!(packed[0], SIGNS_POSITIVE);
        // exponents 1023..=1025: range 2 + 2 -> 2 bits
        assert_eq!(packed[1], 2);
        assert_eq!(packed[2], 3);
        assert_eq!(i16::from_le_bytes([packed[3], packed[4]]), 1023);
        // 4 values * 5 bits = 20 bits -> 3 bytes
        assert_eq!(packed.len(), 13 + 3);
        assert_eq!(back, vec![1.0, 2.0, 4.0, 3.0]);
    }

    #[test]
    fn mixed_signs_keep_a_sign_bit() {
        let values = [-1.5f32, 2.25, -0.125, 100.0];
        let (packed, back) = run(&values, &hints(8)).unwrap();
        assert_eq!(packed[0], SIGNS_MIXED);
        for (x, y) in values.iter().zip(&back) {
            assert!(within_bound(*x as f64, *y as f64, 7), "{x} -> {y}");
            assert_eq!(x.is_sign_negative(), y.is_sign_negative());
        }
    }

    #[test]
    fn all_negative_values() {
        let (packed, back) = run(&[-3.0f64, -5.0], &hints(10)).unwrap();
        assert_eq!(packed[0], SIGNS_NEGATIVE);
        assert_eq!(back, vec![-3.0, -5.0]);
    }

    #[test]
    fn fill_value_is_excluded_and_restored() {
        let h = UserHints { significant_bits: 4, fill_value: -9999.0, ..UserHints::default() };
        let values = [1.1f64, -9999.0, 1.7, 3.3, -9999.0, 2.9];
        let (packed, back) = run(&values, &h).unwrap();
        assert_eq!(packed[0], SIGNS_POSITIVE);
        // 6 values * 5 bits = 30 bits -> 4 bytes
        assert_eq!(packed.len(), 21 + 4);
        for (x, y) in values.iter().zip(&back) {
            if *x == -9999.0 {
                assert_eq!(*y, -9999.0);
            } else {
                assert!(within_bound(*x, *y, 3), "{x} -> {y}");
            }
        }
    }

    #[test]
    fn sentinel_precision_is_rejected() {
        assert!(matches!(run(&[1.0f64], &hints(INT_FINEST)), Err(ScilError::Precision(_))));
        assert!(matches!(run(&[1.0f64], &hints(0)), Err(ScilError::Precision(_))));
        assert!(matches!(run(&[1.0f32], &hints(25)), Err(ScilError::Precision(_))));
        assert!(run(&[1.0f32], &hints(24)).is_ok());
    }

    #[test]
    fn exhausted_exponent_codes_are_an_error() {
        // exponents 1023..=1025 give 2 exponent bits; 7.99 carries into the
        // fourth code, leaving none for the fill value
        let h = UserHints { significant_bits: 2, fill_value: -1.0, ..UserHints::default() };
        let values = [1.0f64, 2.0, 4.0, 7.99];
        assert!(matches!(run(&values, &h), Err(ScilError::Precision(_))));
    }

    proptest! {
        #[test]
        fn error_is_bounded_by_mantissa_bits(
            raw in proptest::collection::vec((1e-30f64..1e30, any::<bool>()), 1..200),
            bits in 1i32..=53,
        ) {
            let values: Vec<f64> = raw.iter().map(|&(v, neg)| if neg { -v } else { v }).collect();
            let (_, back) = run(&values, &hints(bits)).unwrap();
            for (x, y) in values.iter().zip(&back) {
                prop_assert!(within_bound(*x, *y, bits - 1), "{} -> {}", x, y);
            }
        }
    }
}
