//! User accuracy and performance hints.
//!
//! Tolerance fields use two sentinels: `IGNORE` (the metric is not of
//! interest) and `FINEST` (keep the maximum precision the type can carry).

use std::fmt;

/// Tolerance field is not of interest.
pub const DBL_IGNORE: f64 = 0.0;
pub const INT_IGNORE: i32 = 0;

/// Tolerance field asks for the finest representable precision.
pub const DBL_FINEST: f64 = 1e-307;
pub const INT_FINEST: i32 = -1;

/// `fill_value` meaning "no fill value configured".
pub const FILL_NONE: f64 = f64::MAX;

/// Base unit of a performance requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerformanceUnit {
    #[default]
    Ignore,
    MiB,
    GiB,
    /// Throughput of the network interconnect.
    Network,
    NodeLocalStorage,
    /// One thread streaming to shared storage.
    SingleStreamSharedStorage,
}

impl PerformanceUnit {
    pub fn name(self) -> &'static str {
        match self {
            PerformanceUnit::Ignore => "IGNORE",
            PerformanceUnit::MiB => "MiB",
            PerformanceUnit::GiB => "GiB",
            PerformanceUnit::Network => "NetworkSpeed",
            PerformanceUnit::NodeLocalStorage => "NodeLocalStorageSpeed",
            PerformanceUnit::SingleStreamSharedStorage => "SingleStreamSharedStorageSpeed",
        }
    }
}

/// Required performance, expressed as `multiplier * unit`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerformanceHint {
    pub unit: PerformanceUnit,
    pub multiplier: f32,
}

/// Tolerable precision loss and performance requirements for a context.
#[derive(Debug, Clone, PartialEq)]
pub struct UserHints {
    /// Relative tolerable error in percent (1 means 1%).
    pub relative_tolerance_percent: f64,
    /// Lower bound on the resolution of relative errors: values whose
    /// relative error would be finer than this use it as an absolute bound.
    pub relative_err_finest_abs_tolerance: f64,
    /// Absolute tolerable error (1 means 2 may become anything in 1..=3).
    pub absolute_tolerance: f64,
    pub significant_digits: i32,
    pub significant_bits: i32,
    /// Values at or below this are kept exactly.
    pub lossless_data_range_up_to: f64,
    /// Values at or above this are kept exactly.
    pub lossless_data_range_from: f64,
    /// A single value that must survive bit-exact (`FILL_NONE` if unset).
    pub fill_value: f64,
    pub comp_speed: PerformanceHint,
    pub decomp_speed: PerformanceHint,
    /// Comma separated chain that bypasses the chooser.
    pub force_compression_methods: Option<String>,
}

impl Default for UserHints {
    fn default() -> Self {
        Self {
            relative_tolerance_percent: DBL_IGNORE,
            relative_err_finest_abs_tolerance: DBL_IGNORE,
            absolute_tolerance: DBL_IGNORE,
            significant_digits: INT_IGNORE,
            significant_bits: INT_IGNORE,
            lossless_data_range_up_to: -f64::MAX,
            lossless_data_range_from: f64::MAX,
            fill_value: FILL_NONE,
            comp_speed: PerformanceHint::default(),
            decomp_speed: PerformanceHint::default(),
            force_compression_methods: None,
        }
    }
}

impl UserHints {
    #[inline]
    pub fn has_fill_value(&self) -> bool {
        self.fill_value != FILL_NONE
    }

    /// True if `value` must be reproduced exactly: it is the fill value or
    /// falls into a configured lossless range.
    #[inline]
    pub fn is_exact_point(&self, value: f64) -> bool {
        (self.has_fill_value() && value == self.fill_value)
            || value <= self.lossless_data_range_up_to
            || value >= self.lossless_data_range_from
    }

    /// True if a lossless range has been configured.
    pub fn has_lossless_range(&self) -> bool {
        self.lossless_data_range_up_to > -f64::MAX || self.lossless_data_range_from < f64::MAX
    }
}

/// Bits needed to carry `decimals` significant decimal digits.
pub fn bits_from_decimals(decimals: i32) -> i32 {
    if decimals <= 0 {
        return decimals;
    }
    (decimals as f64 * std::f64::consts::LOG2_10).ceil() as i32
}

/// Decimal digits represented by `bits` significant bits.
///
/// Rounds down, then bumps by one when the digits would not carry the
/// requested bits back.
pub fn decimals_from_bits(bits: i32) -> i32 {
    if bits <= 0 {
        return bits;
    }
    let decimals = (bits as f64 * std::f64::consts::LOG10_2).floor() as i32;
    if bits_from_decimals(decimals) < bits {
        decimals + 1
    } else {
        decimals
    }
}

fn write_dbl(f: &mut fmt::Formatter<'_>, name: &str, val: f64) -> fmt::Result {
    if val == DBL_IGNORE || val == f64::MAX {
        writeln!(f, "\t{name}:\tIGNORE")
    } else if val == DBL_FINEST {
        writeln!(f, "\t{name}:\tFINEST")
    } else {
        writeln!(f, "\t{name}:\t{val:.16}")
    }
}

fn write_int(f: &mut fmt::Formatter<'_>, name: &str, val: i32) -> fmt::Result {
    if val == INT_FINEST {
        writeln!(f, "\t{name}:\tFINEST")
    } else {
        writeln!(f, "\t{name}:\t{val}")
    }
}

impl fmt::Display for UserHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "hints:")?;
        write_int(f, "sig digits", self.significant_digits)?;
        write_int(f, "sig bits", self.significant_bits)?;
        write_dbl(f, "abs tol", self.absolute_tolerance)?;
        write_dbl(f, "rel percent", self.relative_tolerance_percent)?;
        write_dbl(f, "rel abs tol", self.relative_err_finest_abs_tolerance)?;
        if self.has_fill_value() {
            writeln!(f, "\tfill value:\t{}", self.fill_value)?;
        }
        writeln!(
            f,
            "\tComp speed: {} * {}",
            self.comp_speed.multiplier,
            self.comp_speed.unit.name()
        )?;
        writeln!(
            f,
            "\tDeco speed: {} * {}",
            self.decomp_speed.multiplier,
            self.decomp_speed.unit.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, 4)]
    #[test_case(2, 7)]
    #[test_case(3, 10)]
    #[test_case(6, 20)]
    #[test_case(15, 50)]
    fn decimals_to_bits(decimals: i32, bits: i32) {
        assert_eq!(bits_from_decimals(decimals), bits);
    }

    #[test_case(1, 1)]
    #[test_case(3, 1)]
    #[test_case(4, 1)]
    #[test_case(5, 2)]
    #[test_case(10, 3)]
    #[test_case(23, 7)]
    fn bits_to_decimals(bits: i32, decimals: i32) {
        assert_eq!(decimals_from_bits(bits), decimals);
    }

    #[test]
    fn sentinels_pass_through_conversion() {
        assert_eq!(bits_from_decimals(INT_FINEST), INT_FINEST);
        assert_eq!(decimals_from_bits(INT_IGNORE), INT_IGNORE);
    }

    #[test]
    fn defaults_ignore_everything() {
        let hints = UserHints::default();
        assert!(!hints.has_fill_value());
        assert!(!hints.has_lossless_range());
        assert!(!hints.is_exact_point(0.0));
        assert!(!hints.is_exact_point(-1e300));
        assert!(hints.to_string().contains("abs tol:\tIGNORE"));
    }

    #[test]
    fn exact_points() {
        let hints = UserHints {
            fill_value: -999.0,
            lossless_data_range_up_to: -1000.0,
            lossless_data_range_from: 1000.0,
            ..UserHints::default()
        };
        assert!(hints.is_exact_point(-999.0));
        assert!(hints.is_exact_point(-5000.0));
        assert!(hints.is_exact_point(1000.0));
        assert!(!hints.is_exact_point(999.0));
        assert!(hints.has_lossless_range());
    }
}
