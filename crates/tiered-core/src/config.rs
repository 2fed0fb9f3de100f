//! Runtime configuration for dispatch
//!
//! The kernel manifest is static; the only knobs decided at run time are a
//! cap on the CPU tier (useful to exercise lower-tier kernels on capable
//! hosts) and the host thread count. Values come from defaults, an
//! optional JSON document, then `TIERED_*` environment variables, in that
//! order of precedence (later wins).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::cpu::CpuTier;
use crate::{Error, Result};

/// Environment variable capping the CPU tier
pub const ENV_MAX_TIER: &str = "TIERED_MAX_TIER";
/// Environment variable setting the host thread count
pub const ENV_NUM_THREADS: &str = "TIERED_NUM_THREADS";

/// Process-wide dispatch configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Highest tier the dispatcher may select. Never raises the detected tier.
    pub max_tier: Option<CpuTier>,
    /// Threads used by the CPU execution context. `None` means all cores.
    pub num_threads: Option<usize>,
}

impl DispatchConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Parse a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loading dispatch config from {}", path.as_ref().display());
        Self::from_json_str(&content)
    }

    /// Apply `TIERED_*` environment variables on top of this config
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_TIER) {
            self.max_tier = Some(value.parse()?);
        }
        if let Some(value) = lookup(ENV_NUM_THREADS) {
            let threads = value.trim().parse::<usize>().map_err(|e| {
                Error::Config(format!("{ENV_NUM_THREADS}='{value}' is not a count: {e}"))
            })?;
            self.num_threads = Some(threads);
        }
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == Some(0) {
            return Err(Error::Config("num_threads must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Thread count the CPU context should use
    pub fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

static GLOBAL: OnceLock<DispatchConfig> = OnceLock::new();

/// Install the process configuration
///
/// Must happen before the first tier detection or context creation; once
/// any component has read the configuration it is frozen.
pub fn install(config: DispatchConfig) -> Result<()> {
    config.validate()?;
    GLOBAL
        .set(config)
        .map_err(|_| Error::Config("dispatch configuration is already in use".to_string()))
}

/// The process configuration, read from the environment on first use
pub fn global() -> &'static DispatchConfig {
    GLOBAL.get_or_init(|| {
        DispatchConfig::from_env().unwrap_or_else(|e| {
            log::warn!("Ignoring invalid dispatch environment: {e}");
            DispatchConfig::default()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.max_tier, None);
        assert!(config.effective_threads() >= 1);
    }

    #[test]
    fn test_json_parsing() {
        let config =
            DispatchConfig::from_json_str(r#"{ "max_tier": "avx2", "num_threads": 4 }"#).unwrap();
        assert_eq!(config.max_tier, Some(CpuTier::Avx2));
        assert_eq!(config.effective_threads(), 4);

        assert!(DispatchConfig::from_json_str(r#"{ "max_tier": "mmx" }"#).is_err());
        assert!(DispatchConfig::from_json_str(r#"{ "unknown": 1 }"#).is_err());
        assert!(DispatchConfig::from_json_str(r#"{ "num_threads": 0 }"#).is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let base = DispatchConfig {
            max_tier: Some(CpuTier::Avx512),
            num_threads: Some(2),
        };
        let config = base
            .with_overrides_from(lookup(&[(ENV_MAX_TIER, "sse4.2")]))
            .unwrap();
        assert_eq!(config.max_tier, Some(CpuTier::Sse42));
        assert_eq!(config.num_threads, Some(2));
    }

    #[test]
    fn test_invalid_env_values() {
        let err = DispatchConfig::default()
            .with_overrides_from(lookup(&[(ENV_NUM_THREADS, "many")]))
            .unwrap_err();
        assert!(err.is_configuration());

        let err = DispatchConfig::default()
            .with_overrides_from(lookup(&[(ENV_NUM_THREADS, "0")]))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_from_missing_file() {
        let err = DispatchConfig::from_file("/nonexistent/tiered.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
