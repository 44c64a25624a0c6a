//! Engine configuration types.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Available backend implementations, in selection priority order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Handle-based worker driven across the stable scanner boundary.
    Native,
    /// Blocking `std::fs` implementation, always available.
    InProcess,
}

/// How the engine picks its backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendChoice {
    /// Highest-priority backend that probes as available.
    #[default]
    Auto,
    /// A specific backend; falls back to in-process when unavailable.
    Forced(BackendKind),
}

/// Configuration for the scan engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Backend selection policy.
    #[builder(default)]
    #[serde(default)]
    pub backend: BackendChoice,

    /// Worker count for parallel scans.
    #[builder(default = "4")]
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Per-path wait ceiling used by facade and orchestrator scans.
    #[builder(default = "Duration::from_secs(60)")]
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout: Duration,

    /// Default entry cap for fast scans.
    #[builder(default = "1000")]
    #[serde(default = "default_fast_scan_cap")]
    pub fast_scan_cap: usize,
}

fn default_pool_size() -> usize {
    4
}

fn default_scan_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_fast_scan_cap() -> usize {
    1000
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.pool_size == Some(0) {
            return Err("pool_size must be at least 1".to_string());
        }
        if self.fast_scan_cap == Some(0) {
            return Err("fast_scan_cap must be at least 1".to_string());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Config that forces a specific backend.
    pub fn with_backend(kind: BackendKind) -> Self {
        Self {
            backend: BackendChoice::Forced(kind),
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            pool_size: default_pool_size(),
            scan_timeout: default_scan_timeout(),
            fast_scan_cap: default_fast_scan_cap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::builder()
            .pool_size(8usize)
            .scan_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.pool_size, 8);
        assert_eq!(config.scan_timeout, Duration::from_secs(5));
        assert_eq!(config.backend, BackendChoice::Auto);
        assert_eq!(config.fast_scan_cap, 1000);
    }

    #[test]
    fn test_config_rejects_zero_pool() {
        let result = EngineConfig::builder().pool_size(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_backend_kind_tokens() {
        assert_eq!(BackendKind::Native.to_string(), "native");
        assert_eq!(
            "in-process".parse::<BackendKind>(),
            Ok(BackendKind::InProcess)
        );
    }

    #[test]
    fn test_forced_backend_helper() {
        let config = EngineConfig::with_backend(BackendKind::InProcess);
        assert_eq!(
            config.backend,
            BackendChoice::Forced(BackendKind::InProcess)
        );
        assert_eq!(config.pool_size, 4);
    }
}
