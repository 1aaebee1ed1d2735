//! N-dimensional extents (up to 4 axes).

use crate::datatype::Datatype;
use crate::error::ScilError;
use crate::Result;

/// Maximum number of axes a `Dims` may describe.
pub const MAX_DIMS: usize = 4;

/// Largest element count accepted from external input. Leaves room for the
/// widest element type and the compressed size bound without overflow.
pub const MAX_ELEMENTS: usize = usize::MAX / 64;

/// Ordered dimension extents. Copied by value between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dims {
    count: u8,
    length: [usize; MAX_DIMS],
}

impl Dims {
    pub fn new_1d(x: usize) -> Self {
        Self { count: 1, length: [x, 0, 0, 0] }
    }

    pub fn new_2d(x: usize, y: usize) -> Self {
        Self { count: 2, length: [x, y, 0, 0] }
    }

    pub fn new_3d(x: usize, y: usize, z: usize) -> Self {
        Self { count: 3, length: [x, y, z, 0] }
    }

    pub fn new_4d(x: usize, y: usize, z: usize, w: usize) -> Self {
        Self { count: 4, length: [x, y, z, w] }
    }

    /// Build from a slice of 1 to 4 extents whose product is at most
    /// [`MAX_ELEMENTS`].
    pub fn from_lengths(lengths: &[usize]) -> Result<Self> {
        if lengths.is_empty() || lengths.len() > MAX_DIMS {
            return Err(ScilError::buffer(format!(
                "dims must have 1..={} axes, got {}",
                MAX_DIMS,
                lengths.len()
            )));
        }
        let total = lengths
            .iter()
            .try_fold(1usize, |acc, &l| acc.checked_mul(l))
            .filter(|&n| n <= MAX_ELEMENTS);
        if total.is_none() {
            return Err(ScilError::buffer(format!("dims {lengths:?} describe too many elements")));
        }
        let mut length = [0usize; MAX_DIMS];
        length[..lengths.len()].copy_from_slice(lengths);
        Ok(Self { count: lengths.len() as u8, length })
    }

    /// Number of axes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.count as usize
    }

    #[inline]
    pub fn lengths(&self) -> &[usize] {
        &self.length[..self.count as usize]
    }

    /// Total element count (product of all extents), saturating at
    /// `usize::MAX`.
    pub fn count(&self) -> usize {
        self.lengths().iter().fold(1usize, |acc, &l| acc.saturating_mul(l))
    }

    /// Bytes needed to hold the elements in `datatype`, saturating.
    pub fn size_in_bytes(&self, datatype: Datatype) -> usize {
        self.count().saturating_mul(datatype.size())
    }

    /// Serialized length of `to_bytes`.
    pub fn encoded_len(&self) -> usize {
        1 + 8 * self.rank()
    }

    /// `count:u8 | length[i]:u64 LE ...`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.count);
        for &l in self.lengths() {
            out.extend_from_slice(&(l as u64).to_le_bytes());
        }
        out
    }

    /// Parse the `to_bytes` layout, returning the dims and the bytes consumed.
    pub fn from_bytes(buf: &[u8]) -> Result<(Self, usize)> {
        let count = *buf
            .first()
            .ok_or_else(|| ScilError::buffer("dims header is empty"))? as usize;
        if count == 0 || count > MAX_DIMS {
            return Err(ScilError::buffer(format!("invalid dims count {count}")));
        }
        let needed = 1 + 8 * count;
        if buf.len() < needed {
            return Err(ScilError::buffer(format!(
                "dims header truncated: {} of {} bytes",
                buf.len(),
                needed
            )));
        }
        let mut lengths = [0usize; MAX_DIMS];
        for (i, chunk) in buf[1..needed].chunks_exact(8).enumerate() {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            let length = u64::from_le_bytes(raw);
            lengths[i] = usize::try_from(length)
                .map_err(|_| ScilError::buffer(format!("dims extent {length} does not fit in memory")))?;
        }
        Ok((Self::from_lengths(&lengths[..count])?, needed))
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, l) in self.lengths().iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{l}")?;
        }
        write!(f, ")")
    }
}
