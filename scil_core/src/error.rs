//! Error types shared by every SCIL crate.

use thiserror::Error;

/// Numeric status codes surfaced to callers that need the classic
/// integer interface (e.g. the CLI exit status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    NoErr = 0,
    BufferErr = 1,
    MemoryErr = 2,
    Einval = 3,
    UnknownErr = 4,
    PrecisionErr = 5,
}

impl ErrorCode {
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::NoErr => "NO_ERR",
            ErrorCode::BufferErr => "BUFFER_ERR",
            ErrorCode::MemoryErr => "MEMORY_ERR",
            ErrorCode::Einval => "EINVAL",
            ErrorCode::UnknownErr => "UNKNOWN_ERR",
            ErrorCode::PrecisionErr => "PRECISION_ERR",
        }
    }
}

/// Errors that can occur while building chains or running codecs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScilError {
    /// A codec cannot meet the requested tolerance, or the transformation
    /// would not reduce the data at all.
    #[error("precision error: {0}")]
    Precision(String),

    /// A packing, quantization or framing step failed.
    #[error("buffer error: {0}")]
    Buffer(String),

    /// The destination buffer is smaller than the required bound.
    #[error("destination buffer too small: {available} bytes, need at least {required}")]
    Memory {
        /// Bytes required by the size bound.
        required: usize,
        /// Bytes the caller provided.
        available: usize,
    },

    /// An algorithm name or id in a chain specification is not registered.
    #[error("unknown compression algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// A chain specification is malformed (stage order, empty list,
    /// datatype not supported by a stage).
    #[error("invalid compression chain: {0}")]
    InvalidChain(String),

    /// A wrapped third-party codec reported a failure.
    #[error("{codec} failed: {message}")]
    Codec {
        /// Name of the failing codec.
        codec: &'static str,
        /// Message reported by the codec.
        message: String,
    },

    /// The algorithm registry is inconsistent.
    #[error("algorithm registry corrupted: {0}")]
    Registry(String),
}

impl ScilError {
    /// Map the error onto the numeric status code family.
    pub fn code(&self) -> ErrorCode {
        match self {
            ScilError::Precision(_) => ErrorCode::PrecisionErr,
            ScilError::Buffer(_) => ErrorCode::BufferErr,
            ScilError::Memory { .. } => ErrorCode::MemoryErr,
            ScilError::UnknownAlgorithm(_) | ScilError::InvalidChain(_) => ErrorCode::Einval,
            ScilError::Codec { .. } | ScilError::Registry(_) => ErrorCode::UnknownErr,
        }
    }

    pub fn buffer(msg: impl Into<String>) -> Self {
        ScilError::Buffer(msg.into())
    }

    pub fn precision(msg: impl Into<String>) -> Self {
        ScilError::Precision(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn einval_kinds_stay_distinguishable() {
        let unknown = ScilError::UnknownAlgorithm("foo".into());
        let order = ScilError::InvalidChain("gzip before abstol".into());
        assert_eq!(unknown.code(), ErrorCode::Einval);
        assert_eq!(order.code(), ErrorCode::Einval);
        assert_ne!(unknown, order);
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::NoErr as u8, 0);
        assert_eq!(ErrorCode::PrecisionErr as u8, 5);
        assert_eq!(ScilError::Precision("x".into()).code().name(), "PRECISION_ERR");
    }
}
