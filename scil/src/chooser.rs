//! Picks a chain for contexts that were not given one.

use scil_codecs::{Lz4Codec, ALGO_LZ4, ALGO_MEMCOPY};
use scil_core::{ByteCompressor, Dims, Result, ScilError};

use crate::chain::Chain;
use crate::config::{self, EnvConfig, ForcedChain};
use crate::context::CompressionContext;

/// Inputs with fewer elements are always copied.
pub const TINY_INPUT: usize = 10;
/// Samples compressing to more than this percentage count as random.
pub const RANDOMNESS_THRESHOLD: f64 = 95.0;

/// Percentage of `sample` that remains after lz4 compression.
///
/// 100 means incompressible; values above 100 are possible for random data.
pub fn determine_randomness(sample: &[u8]) -> Result<f64> {
    if sample.is_empty() {
        return Ok(100.0);
    }
    let mut compressed = Vec::with_capacity(sample.len());
    Lz4Codec.compress(sample, &mut compressed)?;
    Ok(100.0 * compressed.len() as f64 / sample.len() as f64)
}

/// Resolve the chain of `ctx` using the process environment.
pub fn choose(ctx: &mut CompressionContext, src: &[u8], dims: &Dims) -> Result<()> {
    choose_with(ctx, src, dims, config::env())
}

/// Resolve the chain of `ctx` using `env`.
///
/// Does nothing when the context already has a chain, so repeated calls
/// keep the first decision.
pub fn choose_with(
    ctx: &mut CompressionContext,
    src: &[u8],
    dims: &Dims,
    env: &EnvConfig,
) -> Result<()> {
    if ctx.chain().is_some() {
        return Ok(());
    }

    match &env.forced_chain {
        Some(ForcedChain::Chain(spec)) => {
            let chain = Chain::parse(spec).map_err(|e| {
                tracing::warn!(variable = config::FORCE_CHAIN_ENV, value = %spec, error = %e, "forced chain rejected");
                e
            })?;
            tracing::debug!(%chain, "chain forced by environment");
            ctx.set_chain(chain);
            return Ok(());
        }
        Some(ForcedChain::Lossless) => ctx.require_lossless(),
        None => {}
    }

    let count = dims.count();
    let id = if count < TINY_INPUT {
        tracing::debug!(count, "tiny input, copying");
        ALGO_MEMCOPY
    } else {
        let sample_len = count.min(env.sample_limit) * ctx.datatype().size();
        let sample = src.get(..sample_len).ok_or_else(|| {
            ScilError::buffer(format!(
                "source holds {} bytes, dims {dims} need {}",
                src.len(),
                dims.size_in_bytes(ctx.datatype())
            ))
        })?;
        let randomness = determine_randomness(sample)?;
        // both candidates are lossless, so lossless mode needs no extra branch
        let id = if randomness > RANDOMNESS_THRESHOLD { ALGO_MEMCOPY } else { ALGO_LZ4 };
        tracing::debug!(randomness, sample_len, chosen = id, "measured sample randomness");
        id
    };

    let chain = Chain::from_algorithms([scil_codecs::by_id(id)?])?;
    tracing::debug!(%chain, lossless = ctx.lossless_needed(), "chain chosen");
    ctx.set_chain(chain);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scil_core::datatype::encode_samples;
    use scil_core::{Datatype, UserHints};

    fn ctx() -> CompressionContext {
        CompressionContext::new(Datatype::Double, &UserHints::default()).unwrap()
    }

    fn doubles(values: &[f64]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_samples(values, &mut out);
        out
    }

    /// xorshift bytes, incompressible for lz4
    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x9e37_79b9_7f4a_7c15u64;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect()
    }

    #[test]
    fn randomness_scores() {
        assert!(determine_randomness(&[0u8; 4096]).unwrap() < 10.0);
        assert!(determine_randomness(&noise(4096)).unwrap() > RANDOMNESS_THRESHOLD);
        assert_eq!(determine_randomness(&[]).unwrap(), 100.0);
    }

    #[test]
    fn tiny_inputs_are_copied() {
        let mut ctx = ctx();
        let src = doubles(&[1.0; 5]);
        choose_with(&mut ctx, &src, &Dims::new_1d(5), &EnvConfig::default()).unwrap();
        assert_eq!(ctx.chain().unwrap().to_string(), "memcopy");
    }

    #[test]
    fn compressible_data_gets_lz4_and_noise_is_copied() {
        let mut ctx1 = ctx();
        let src = doubles(&[3.0; 1000]);
        choose_with(&mut ctx1, &src, &Dims::new_1d(1000), &EnvConfig::default()).unwrap();
        assert_eq!(ctx1.chain().unwrap().to_string(), "lz4");

        let mut ctx2 = ctx();
        let src = noise(8000);
        choose_with(&mut ctx2, &src, &Dims::new_1d(1000), &EnvConfig::default()).unwrap();
        assert_eq!(ctx2.chain().unwrap().to_string(), "memcopy");
    }

    #[test]
    fn first_decision_sticks() {
        let mut ctx = ctx();
        let dims = Dims::new_1d(1000);
        choose_with(&mut ctx, &doubles(&[3.0; 1000]), &dims, &EnvConfig::default()).unwrap();
        let first = ctx.chain().cloned();
        choose_with(&mut ctx, &noise(8000), &dims, &EnvConfig::default()).unwrap();
        assert_eq!(ctx.chain().cloned(), first);
    }

    #[test]
    fn environment_overrides() {
        let env = EnvConfig {
            forced_chain: Some(ForcedChain::Chain("sigbits,zstd".into())),
            ..EnvConfig::default()
        };
        let mut ctx1 = ctx();
        choose_with(&mut ctx1, &doubles(&[1.0; 3]), &Dims::new_1d(3), &env).unwrap();
        assert_eq!(ctx1.chain().unwrap().to_string(), "sigbits,zstd");

        let env = EnvConfig { forced_chain: Some(ForcedChain::Lossless), ..EnvConfig::default() };
        let mut ctx2 = ctx();
        choose_with(&mut ctx2, &doubles(&[1.0; 3]), &Dims::new_1d(3), &env).unwrap();
        assert!(ctx2.lossless_needed());
        assert!(!ctx2.chain().unwrap().is_lossy());

        let env = EnvConfig {
            forced_chain: Some(ForcedChain::Chain("lz4,abstol".into())),
            ..EnvConfig::default()
        };
        let mut ctx3 = ctx();
        let res = choose_with(&mut ctx3, &doubles(&[1.0; 3]), &Dims::new_1d(3), &env);
        assert!(matches!(res, Err(ScilError::InvalidChain(_))));
        assert!(ctx3.chain().is_none());
    }

    #[test]
    fn sample_limit_caps_the_measurement() {
        let env = EnvConfig { sample_limit: 100, ..EnvConfig::default() };
        let mut values = vec![0.0f64; 100];
        values.extend((0..900).map(|i| (i as f64 * 0.7311).sin()));
        let mut ctx = ctx();
        choose_with(&mut ctx, &doubles(&values), &Dims::new_1d(1000), &env).unwrap();
        assert_eq!(ctx.chain().unwrap().to_string(), "lz4");
    }
}
