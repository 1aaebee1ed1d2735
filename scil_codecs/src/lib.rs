mod abstol;
mod delta;
mod gzip_codec;
mod lz4_codec;
mod memcopy;
mod quantize;
mod sigbits;
mod xor_delta;
mod zstd_codec;

pub use abstol::AbstolCodec;
pub use delta::DeltaPreconditioner;
pub use gzip_codec::GzipCodec;
pub use lz4_codec::Lz4Codec;
pub use memcopy::MemcopyCodec;
pub use quantize::QuantizeConverter;
pub use sigbits::SigbitsCodec;
pub use xor_delta::XorDeltaPreconditioner;
pub use zstd_codec::ZstdCodec;

use once_cell::sync::Lazy;
use scil_core::datatype::{decode_samples, Sample};
use scil_core::{Algorithm, AlgorithmKind, Datatype, Dims, Result, ScilError};

// ── Algorithm ids (= magic bytes) ───────────────────────────────────────────

pub const ALGO_MEMCOPY: u8 = 0;
pub const ALGO_ABSTOL: u8 = 1;
pub const ALGO_GZIP: u8 = 2;
pub const ALGO_SIGBITS: u8 = 3;
pub const ALGO_LZ4: u8 = 4;
pub const ALGO_ZSTD: u8 = 5;
pub const ALGO_XOR_DELTA: u8 = 6;
pub const ALGO_QUANTIZE: u8 = 7;
pub const ALGO_DELTA: u8 = 8;

/// Every registered algorithm, indexed by id.
static ALGORITHMS: [Algorithm; 9] = [
    Algorithm::new("memcopy", ALGO_MEMCOPY, false, AlgorithmKind::Byte(&MemcopyCodec)),
    Algorithm::new("abstol", ALGO_ABSTOL, true, AlgorithmKind::Datatype(&AbstolCodec)),
    Algorithm::new("gzip", ALGO_GZIP, false, AlgorithmKind::Byte(&GzipCodec::DEFAULT)),
    Algorithm::new("sigbits", ALGO_SIGBITS, true, AlgorithmKind::Datatype(&SigbitsCodec)),
    Algorithm::new("lz4", ALGO_LZ4, false, AlgorithmKind::Byte(&Lz4Codec)),
    Algorithm::new("zstd", ALGO_ZSTD, false, AlgorithmKind::Byte(&ZstdCodec::DEFAULT)),
    Algorithm::new(
        "xor_delta",
        ALGO_XOR_DELTA,
        false,
        AlgorithmKind::PreconditionerFirst(&XorDeltaPreconditioner),
    ),
    Algorithm::new("quantize", ALGO_QUANTIZE, true, AlgorithmKind::Converter(&QuantizeConverter)),
    Algorithm::new(
        "delta",
        ALGO_DELTA,
        false,
        AlgorithmKind::PreconditionerSecond(&DeltaPreconditioner),
    ),
];

static REGISTRY: Lazy<std::result::Result<&'static [Algorithm], ScilError>> = Lazy::new(|| {
    validate_registry(&ALGORITHMS)?;
    tracing::debug!(algorithms = ALGORITHMS.len(), "algorithm registry initialized");
    Ok(&ALGORITHMS[..])
});

/// Check that every entry's id equals its index and names are unique.
pub fn validate_registry(algorithms: &[Algorithm]) -> Result<()> {
    for (index, algo) in algorithms.iter().enumerate() {
        if algo.id as usize != index {
            return Err(ScilError::Registry(format!(
                "algorithm '{}' declares id {} but sits at index {index}",
                algo.name, algo.id
            )));
        }
        if algorithms[..index].iter().any(|other| other.name == algo.name) {
            return Err(ScilError::Registry(format!("duplicate algorithm name '{}'", algo.name)));
        }
    }
    Ok(())
}

/// The validated, process-wide algorithm table.
pub fn registry() -> Result<&'static [Algorithm]> {
    match &*REGISTRY {
        Ok(algorithms) => Ok(*algorithms),
        Err(e) => Err(e.clone()),
    }
}

/// Number of registered algorithms.
pub fn available_count() -> usize {
    ALGORITHMS.len()
}

/// Name of the algorithm with magic `id`, if registered.
pub fn name_of(id: u8) -> Option<&'static str> {
    ALGORITHMS.get(id as usize).map(|a| a.name)
}

/// Resolve a symbolic name or a numeric id given as a string.
pub fn id_by_name(name: &str) -> Option<u8> {
    let name = name.trim();
    if let Ok(id) = name.parse::<u8>() {
        return ALGORITHMS.get(id as usize).map(|a| a.id);
    }
    ALGORITHMS.iter().find(|a| a.name == name).map(|a| a.id)
}

/// Look up an algorithm by the magic byte found in a stream.
pub fn by_id(id: u8) -> Result<&'static Algorithm> {
    registry()?
        .get(id as usize)
        .ok_or_else(|| ScilError::UnknownAlgorithm(format!("magic {id}")))
}

/// Look up an algorithm by name or numeric id string.
pub fn by_name(name: &str) -> Result<&'static Algorithm> {
    let id = id_by_name(name).ok_or_else(|| ScilError::UnknownAlgorithm(name.trim().to_string()))?;
    by_id(id)
}

// ── Helpers shared by the typed codecs ──────────────────────────────────────

/// Decode `src` and check it holds exactly `dims.count()` elements.
pub(crate) fn decode_elements<T: Sample>(src: &[u8], dims: &Dims) -> Result<Vec<T>> {
    let values = decode_samples::<T>(src)?;
    if values.len() != dims.count() {
        return Err(ScilError::buffer(format!(
            "buffer holds {} elements, dims {} describe {}",
            values.len(),
            dims,
            dims.count()
        )));
    }
    Ok(values)
}

/// Split `src` into elements of `datatype`, each zero-extended into a
/// `u64` word.
pub(crate) fn element_words(src: &[u8], datatype: Datatype, dims: &Dims) -> Result<Vec<u64>> {
    let expected = dims.size_in_bytes(datatype);
    if src.len() != expected {
        return Err(ScilError::buffer(format!(
            "buffer holds {} bytes, {} {datatype} elements need {expected}",
            src.len(),
            dims.count()
        )));
    }
    Ok(src
        .chunks_exact(datatype.size())
        .map(|chunk| {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
        .collect())
}

/// Append the low `datatype.size()` bytes of each word.
pub(crate) fn push_words(words: impl IntoIterator<Item = u64>, datatype: Datatype, dest: &mut Vec<u8>) {
    let size = datatype.size();
    for word in words {
        dest.extend_from_slice(&word.to_le_bytes()[..size]);
    }
}

pub(crate) fn codec_error(codec: &'static str, err: impl std::fmt::Display) -> ScilError {
    ScilError::Codec { codec, message: err.to_string() }
}

pub(crate) fn unsupported(codec: &str, datatype: Datatype) -> ScilError {
    ScilError::InvalidChain(format!("{codec} does not support {datatype} data"))
}
