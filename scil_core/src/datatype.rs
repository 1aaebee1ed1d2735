//! Element datatypes and their little-endian byte representation.
//!
//! Every stage of a chain exchanges plain byte buffers; the datatype tag tells
//! a stage how to reinterpret them. `Sample` does the byte conversion and
//! `FloatSample` exposes the IEEE-754 fields through explicit shift/mask on
//! the raw bit pattern.

use crate::error::ScilError;
use crate::Result;

/// Element type of the data being compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Datatype {
    Float = 0,
    Double = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
}

impl Datatype {
    pub const ALL: [Datatype; 6] = [
        Datatype::Float,
        Datatype::Double,
        Datatype::Int8,
        Datatype::Int16,
        Datatype::Int32,
        Datatype::Int64,
    ];

    /// Size of one element in bytes.
    #[inline]
    pub fn size(self) -> usize {
        match self {
            Datatype::Int8 => 1,
            Datatype::Int16 => 2,
            Datatype::Float | Datatype::Int32 => 4,
            Datatype::Double | Datatype::Int64 => 8,
        }
    }

    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, Datatype::Float | Datatype::Double)
    }

    /// Explicitly stored mantissa bits (23 for float, 52 for double).
    pub fn mantissa_bits(self) -> Option<u8> {
        match self {
            Datatype::Float => Some(23),
            Datatype::Double => Some(52),
            _ => None,
        }
    }

    /// Number of significant decimal digits the native type can carry.
    pub fn max_significant_digits(self) -> Option<i32> {
        match self {
            Datatype::Float => Some(6),
            Datatype::Double => Some(15),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Datatype::Float => "float",
            Datatype::Double => "double",
            Datatype::Int8 => "int8",
            Datatype::Int16 => "int16",
            Datatype::Int32 => "int32",
            Datatype::Int64 => "int64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }

    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|d| *d as u8 == tag)
    }
}

impl std::fmt::Display for Datatype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A value that can travel through a chain as little-endian bytes.
pub trait Sample: Copy + PartialOrd + Send + Sync + 'static {
    const DATATYPE: Datatype;

    fn write_le(self, out: &mut Vec<u8>);

    /// `bytes` must be exactly `DATATYPE.size()` long.
    fn read_le(bytes: &[u8]) -> Self;

    fn to_f64(self) -> f64;
}

macro_rules! impl_sample {
    ($t:ty, $dt:expr) => {
        impl Sample for $t {
            const DATATYPE: Datatype = $dt;

            #[inline]
            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_sample!(f32, Datatype::Float);
impl_sample!(f64, Datatype::Double);
impl_sample!(i8, Datatype::Int8);
impl_sample!(i16, Datatype::Int16);
impl_sample!(i32, Datatype::Int32);
impl_sample!(i64, Datatype::Int64);

/// Decode a little-endian byte buffer into typed values.
pub fn decode_samples<T: Sample>(bytes: &[u8]) -> Result<Vec<T>> {
    let size = T::DATATYPE.size();
    if bytes.len() % size != 0 {
        return Err(ScilError::buffer(format!(
            "{} bytes is not a whole number of {} elements",
            bytes.len(),
            T::DATATYPE
        )));
    }
    Ok(bytes.chunks_exact(size).map(T::read_le).collect())
}

/// Append typed values to `out` as little-endian bytes.
pub fn encode_samples<T: Sample>(values: &[T], out: &mut Vec<u8>) {
    out.reserve(values.len() * T::DATATYPE.size());
    for &v in values {
        v.write_le(out);
    }
}

/// IEEE-754 binary floating point access.
pub trait FloatSample: Sample {
    /// Stored mantissa width.
    const MANTISSA_BITS: u32;
    /// Exponent field width.
    const EXPONENT_BITS: u32;

    fn to_raw(self) -> u64;
    fn from_raw(raw: u64) -> Self;
    fn from_f64(v: f64) -> Self;

    #[inline]
    fn exponent_field_max() -> u16 {
        ((1u32 << Self::EXPONENT_BITS) - 1) as u16
    }

    /// Split into (sign, biased exponent, mantissa).
    #[inline]
    fn fields(self) -> (u8, u16, u64) {
        let raw = self.to_raw();
        let sign = (raw >> (Self::MANTISSA_BITS + Self::EXPONENT_BITS)) & 1;
        let exponent = (raw >> Self::MANTISSA_BITS) & ((1u64 << Self::EXPONENT_BITS) - 1);
        let mantissa = raw & ((1u64 << Self::MANTISSA_BITS) - 1);
        (sign as u8, exponent as u16, mantissa)
    }

    #[inline]
    fn from_fields(sign: u8, exponent: u16, mantissa: u64) -> Self {
        let raw = ((sign as u64 & 1) << (Self::MANTISSA_BITS + Self::EXPONENT_BITS))
            | ((exponent as u64 & ((1u64 << Self::EXPONENT_BITS) - 1)) << Self::MANTISSA_BITS)
            | (mantissa & ((1u64 << Self::MANTISSA_BITS) - 1));
        Self::from_raw(raw)
    }
}

impl FloatSample for f32 {
    const MANTISSA_BITS: u32 = 23;
    const EXPONENT_BITS: u32 = 8;

    #[inline]
    fn to_raw(self) -> u64 {
        self.to_bits() as u64
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        f32::from_bits(raw as u32)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl FloatSample for f64 {
    const MANTISSA_BITS: u32 = 52;
    const EXPONENT_BITS: u32 = 11;

    #[inline]
    fn to_raw(self) -> u64 {
        self.to_bits()
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        f64::from_bits(raw)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
}
