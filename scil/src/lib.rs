pub mod buffers;
pub mod chain;
pub mod chooser;
pub mod compressor;
pub mod config;
pub mod context;
pub mod validate;

pub use chain::Chain;
pub use chooser::{choose, determine_randomness};
pub use compressor::{
    compress, compress_buffer_size_bound, compress_into, decompress, describe_stream, StreamInfo,
};
pub use context::CompressionContext;
pub use validate::{validate, ToleranceField, ValidationReport};

pub use scil_core::{Datatype, Dims, ErrorCode, Result, ScilError, UserHints};
