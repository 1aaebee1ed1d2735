pub mod accuracy;
pub mod algorithm;
pub mod bitpack;
pub mod datatype;
pub mod dims;
pub mod error;
pub mod format;
pub mod hints;
pub mod quantizer;

pub use accuracy::determine_accuracy;
pub use algorithm::{
    Algorithm, AlgorithmKind, ByteCompressor, Converter, DatatypeCompressor, Preconditioner,
    StageKind,
};
pub use datatype::{Datatype, FloatSample, Sample};
pub use dims::Dims;
pub use error::{ErrorCode, ScilError};
pub use hints::{PerformanceHint, PerformanceUnit, UserHints};

pub type Result<T> = std::result::Result<T, ScilError>;
