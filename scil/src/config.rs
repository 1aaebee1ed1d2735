//! Process-wide settings read from the environment.

use once_cell::sync::Lazy;

/// Forces the chain of every context that did not set one explicitly.
pub const FORCE_CHAIN_ENV: &str = "SCIL_FORCE_COMPRESSION_CHAIN";
/// Upper bound on the elements the chooser samples.
pub const SAMPLE_LIMIT_ENV: &str = "SCIL_CHOOSER_SAMPLE_LIMIT";

pub const DEFAULT_SAMPLE_LIMIT: usize = 10_000;

/// Override requested through [`FORCE_CHAIN_ENV`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForcedChain {
    /// The literal value `lossless`.
    Lossless,
    /// Any other value, parsed as a chain when a context first needs it.
    Chain(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub forced_chain: Option<ForcedChain>,
    pub sample_limit: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self { forced_chain: None, sample_limit: DEFAULT_SAMPLE_LIMIT }
    }
}

impl EnvConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let forced_chain = lookup(FORCE_CHAIN_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| if v == "lossless" { ForcedChain::Lossless } else { ForcedChain::Chain(v) });

        let sample_limit = match lookup(SAMPLE_LIMIT_ENV) {
            None => DEFAULT_SAMPLE_LIMIT,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    tracing::warn!(
                        variable = SAMPLE_LIMIT_ENV,
                        value = %raw,
                        default = DEFAULT_SAMPLE_LIMIT,
                        "ignoring invalid chooser sample limit"
                    );
                    DEFAULT_SAMPLE_LIMIT
                }
            },
        };

        Self { forced_chain, sample_limit }
    }
}

static ENV: Lazy<EnvConfig> = Lazy::new(|| {
    let config = EnvConfig::from_env();
    tracing::debug!(?config, "environment configuration loaded");
    config
});

/// The configuration of this process, read on first use.
pub fn env() -> &'static EnvConfig {
    &ENV
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(EnvConfig::from_lookup(lookup(&[])), EnvConfig::default());
    }

    #[test]
    fn lossless_keyword_and_literal_chain() {
        let cfg = EnvConfig::from_lookup(lookup(&[(FORCE_CHAIN_ENV, "lossless")]));
        assert_eq!(cfg.forced_chain, Some(ForcedChain::Lossless));

        let cfg = EnvConfig::from_lookup(lookup(&[(FORCE_CHAIN_ENV, " abstol,lz4 ")]));
        assert_eq!(cfg.forced_chain, Some(ForcedChain::Chain("abstol,lz4".into())));

        let cfg = EnvConfig::from_lookup(lookup(&[(FORCE_CHAIN_ENV, "  ")]));
        assert_eq!(cfg.forced_chain, None);
    }

    #[test]
    fn sample_limit_falls_back_on_garbage() {
        let cfg = EnvConfig::from_lookup(lookup(&[(SAMPLE_LIMIT_ENV, "250")]));
        assert_eq!(cfg.sample_limit, 250);
        let cfg = EnvConfig::from_lookup(lookup(&[(SAMPLE_LIMIT_ENV, "lots")]));
        assert_eq!(cfg.sample_limit, DEFAULT_SAMPLE_LIMIT);
        let cfg = EnvConfig::from_lookup(lookup(&[(SAMPLE_LIMIT_ENV, "0")]));
        assert_eq!(cfg.sample_limit, DEFAULT_SAMPLE_LIMIT);
    }
}
