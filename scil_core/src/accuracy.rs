//! Achieved-accuracy estimation between an original and a reconstructed buffer.

use crate::datatype::{decode_samples, Datatype, FloatSample, Sample};
use crate::error::ScilError;
use crate::hints::{decimals_from_bits, UserHints};
use crate::Result;

#[derive(Debug, Default, Clone, Copy)]
struct Worst {
    absolute: f64,
    relative: f64,
    finest_absolute: f64,
    significant_bits: i32,
}

impl Worst {
    fn new(significant_bits: i32) -> Self {
        Self { significant_bits, ..Self::default() }
    }

    fn record(&mut self, original: f64, reconstructed: f64, err: f64, bits: i32, finest: f64) {
        self.absolute = self.absolute.max(err);
        self.significant_bits = self.significant_bits.min(bits);
        if err == 0.0 {
            return;
        }
        if err >= finest {
            let relative = if original == 0.0 {
                f64::INFINITY
            } else {
                (1.0 - reconstructed / original).abs()
            };
            self.relative = self.relative.max(relative);
        } else {
            self.finest_absolute = self.finest_absolute.max(err);
        }
    }
}

/// Mantissa bits two floats agree on, counted from the top.
///
/// Zero if the signs differ or the exponents are more than one apart. When
/// they are one apart, the difference is measured in units of the larger
/// value's last place.
fn matching_bits<T: FloatSample>(a: T, b: T) -> i32 {
    let m = T::MANTISSA_BITS;
    let (sa, ea, ma) = a.fields();
    let (sb, eb, mb) = b.fields();
    if sa != sb {
        return 0;
    }
    let res = match ea.abs_diff(eb) {
        0 => ma.abs_diff(mb),
        1 => {
            let (hi, lo) = if ea > eb { (ma, mb) } else { (mb, ma) };
            let hi = ((1u64 << m) + hi) << 1;
            let lo = (1u64 << m) + lo;
            (hi - lo) >> 1
        }
        _ => return 0,
    };
    if res == 0 {
        return m as i32;
    }
    let top = 63 - res.leading_zeros() as i32;
    (m as i32 - top).max(0)
}

fn accumulate_float<T: FloatSample>(a: &[u8], b: &[u8], finest: f64) -> Result<Worst> {
    let original = decode_samples::<T>(a)?;
    let reconstructed = decode_samples::<T>(b)?;
    let mut worst = Worst::new(T::MANTISSA_BITS as i32);
    for (&x, &y) in original.iter().zip(&reconstructed) {
        let (x64, y64) = (x.to_f64(), y.to_f64());
        let err = if x64 == y64 { 0.0 } else { (x64 - y64).abs() };
        worst.record(x64, y64, err, matching_bits(x, y), finest);
    }
    Ok(worst)
}

fn accumulate_int<T: Sample>(a: &[u8], b: &[u8], finest: f64) -> Result<Worst> {
    let original = decode_samples::<T>(a)?;
    let reconstructed = decode_samples::<T>(b)?;
    let value_bits = (T::DATATYPE.size() * 8 - 1) as i32;
    let mut worst = Worst::new(value_bits);
    for (&x, &y) in original.iter().zip(&reconstructed) {
        let (x64, y64) = (x.to_f64(), y.to_f64());
        let err = (x64 - y64).abs();
        let bits = if err == 0.0 {
            value_bits
        } else {
            let magnitude = x64.abs().max(1.0).log2().floor() as i32 + 1;
            let noise = err.log2().floor() as i32 + 1;
            (magnitude - noise).max(0)
        };
        worst.record(x64, y64, err, bits, finest);
    }
    Ok(worst)
}

/// Compare `original` against `reconstructed` element by element and report
/// the worst accuracy observed.
///
/// The returned hints hold the largest absolute error, the largest relative
/// error in percent (only for errors at or above
/// `relative_err_finest_abs_tolerance`), the largest error below that floor,
/// and the fewest matching significant bits and digits.
pub fn determine_accuracy(
    datatype: Datatype,
    original: &[u8],
    reconstructed: &[u8],
    relative_err_finest_abs_tolerance: f64,
) -> Result<UserHints> {
    if original.len() != reconstructed.len() {
        return Err(ScilError::buffer(format!(
            "cannot compare {} bytes against {} bytes",
            original.len(),
            reconstructed.len()
        )));
    }
    let finest = relative_err_finest_abs_tolerance;
    let worst = match datatype {
        Datatype::Float => accumulate_float::<f32>(original, reconstructed, finest)?,
        Datatype::Double => accumulate_float::<f64>(original, reconstructed, finest)?,
        Datatype::Int8 => accumulate_int::<i8>(original, reconstructed, finest)?,
        Datatype::Int16 => accumulate_int::<i16>(original, reconstructed, finest)?,
        Datatype::Int32 => accumulate_int::<i32>(original, reconstructed, finest)?,
        Datatype::Int64 => accumulate_int::<i64>(original, reconstructed, finest)?,
    };

    let finest_absolute = if worst.finest_absolute == 0.0 {
        worst.absolute
    } else {
        worst.finest_absolute
    };
    Ok(UserHints {
        absolute_tolerance: worst.absolute,
        relative_tolerance_percent: worst.relative * 100.0,
        relative_err_finest_abs_tolerance: finest_absolute,
        significant_bits: worst.significant_bits,
        significant_digits: decimals_from_bits(worst.significant_bits),
        ..UserHints::default()
    })
}
