use std::fmt;

use crate::datatype::Datatype;
use crate::dims::Dims;
use crate::hints::UserHints;
use crate::Result;

/// Position of an algorithm inside a chain. Stages must appear in
/// non-decreasing order of this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum StageKind {
    PreconditionerFirst = 0,
    Converter = 1,
    PreconditionerSecond = 2,
    Datatype = 3,
    Byte = 4,
}

impl StageKind {
    pub fn name(self) -> &'static str {
        match self {
            StageKind::PreconditionerFirst => "preconditioner-first",
            StageKind::Converter => "converter",
            StageKind::PreconditionerSecond => "preconditioner-second",
            StageKind::Datatype => "datatype",
            StageKind::Byte => "byte",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lossless compressor over an untyped byte buffer.
///
/// Implementations append to `dest`; they never inspect what precedes the
/// write position.
pub trait ByteCompressor: Send + Sync {
    fn compress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()>;

    fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()>;
}

/// Compressor over a typed n-dimensional array.
///
/// `src` holds `dims.count()` little-endian elements of `datatype`. The
/// encoded form must be self-describing: `decompress` only receives the
/// bytes written by `compress`, plus the datatype and dims.
pub trait DatatypeCompressor: Send + Sync {
    fn supports(&self, datatype: Datatype) -> bool;

    fn compress(
        &self,
        datatype: Datatype,
        hints: &UserHints,
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<()>;

    fn decompress(&self, datatype: Datatype, src: &[u8], dims: &Dims, dest: &mut Vec<u8>)
        -> Result<()>;
}

/// Element-count preserving transform of typed data.
///
/// `precondition` writes the transformed elements to `dest` and returns the
/// stage header needed to undo it; `restore` gets that header back.
pub trait Preconditioner: Send + Sync {
    fn supports(&self, datatype: Datatype) -> bool;

    fn precondition(
        &self,
        datatype: Datatype,
        hints: &UserHints,
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<Vec<u8>>;

    fn restore(
        &self,
        datatype: Datatype,
        header: &[u8],
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<()>;
}

/// Changes the element representation, e.g. floats to integer indices.
pub trait Converter: Send + Sync {
    fn supports(&self, input: Datatype) -> bool;

    /// Datatype of the elements written by `convert`.
    fn output_datatype(&self, input: Datatype) -> Datatype;

    /// Returns the stage header needed by `revert`.
    fn convert(
        &self,
        input: Datatype,
        hints: &UserHints,
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<Vec<u8>>;

    /// `input` is the datatype originally passed to `convert`.
    fn revert(
        &self,
        input: Datatype,
        header: &[u8],
        src: &[u8],
        dims: &Dims,
        dest: &mut Vec<u8>,
    ) -> Result<()>;
}

/// Stage slot together with the implementation that fills it.
#[derive(Clone, Copy)]
pub enum AlgorithmKind {
    PreconditionerFirst(&'static dyn Preconditioner),
    Converter(&'static dyn Converter),
    PreconditionerSecond(&'static dyn Preconditioner),
    Datatype(&'static dyn DatatypeCompressor),
    Byte(&'static dyn ByteCompressor),
}

impl AlgorithmKind {
    pub const fn stage(&self) -> StageKind {
        match self {
            AlgorithmKind::PreconditionerFirst(_) => StageKind::PreconditionerFirst,
            AlgorithmKind::Converter(_) => StageKind::Converter,
            AlgorithmKind::PreconditionerSecond(_) => StageKind::PreconditionerSecond,
            AlgorithmKind::Datatype(_) => StageKind::Datatype,
            AlgorithmKind::Byte(_) => StageKind::Byte,
        }
    }
}

/// A registered algorithm. Its `id` is also the magic byte identifying the
/// stage in a compressed stream.
#[derive(Clone, Copy)]
pub struct Algorithm {
    pub name: &'static str,
    pub id: u8,
    is_lossy: bool,
    pub kind: AlgorithmKind,
}

impl Algorithm {
    /// Byte compressors are always registered as lossless.
    pub const fn new(name: &'static str, id: u8, is_lossy: bool, kind: AlgorithmKind) -> Self {
        let is_lossy = match kind {
            AlgorithmKind::Byte(_) => false,
            _ => is_lossy,
        };
        Self { name, id, is_lossy, kind }
    }

    #[inline]
    pub fn is_lossy(&self) -> bool {
        self.is_lossy
    }

    #[inline]
    pub fn stage(&self) -> StageKind {
        self.kind.stage()
    }

    /// Whether the algorithm can run on elements of `datatype`.
    pub fn supports(&self, datatype: Datatype) -> bool {
        match self.kind {
            AlgorithmKind::PreconditionerFirst(p) | AlgorithmKind::PreconditionerSecond(p) => {
                p.supports(datatype)
            }
            AlgorithmKind::Converter(c) => c.supports(datatype),
            AlgorithmKind::Datatype(d) => d.supports(datatype),
            AlgorithmKind::Byte(_) => true,
        }
    }
}

impl fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Algorithm")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("is_lossy", &self.is_lossy)
            .field("stage", &self.stage())
            .finish()
    }
}

impl PartialEq for Algorithm {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name
    }
}

impl Eq for Algorithm {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl ByteCompressor for Echo {
        fn compress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()> {
            dest.extend_from_slice(src);
            Ok(())
        }

        fn decompress(&self, src: &[u8], dest: &mut Vec<u8>) -> Result<()> {
            dest.extend_from_slice(src);
            Ok(())
        }
    }

    #[test]
    fn byte_algorithms_are_forced_lossless() {
        let algo = Algorithm::new("copy", 0, true, AlgorithmKind::Byte(&Echo));
        assert!(!algo.is_lossy());
        assert_eq!(algo.stage(), StageKind::Byte);
        assert!(algo.supports(Datatype::Int16));
    }

    #[test]
    fn stage_order() {
        assert!(StageKind::PreconditionerFirst < StageKind::Converter);
        assert!(StageKind::Converter < StageKind::PreconditionerSecond);
        assert!(StageKind::Datatype < StageKind::Byte);
    }
}
