//! Runtime configuration for the provisioning core.
//!
//! Loaded from TOML. Every section and field is optional; missing values
//! take the defaults below.
//!
//! ```toml
//! [gate]
//! enabled = true
//!
//! [fetch]
//! max_in_flight = 16
//!
//! [provision]
//! compensate_on_failure = false
//!
//! [store]
//! timeout_ms = 10000
//!
//! [baselines]
//! batch_size = 1000
//! workers = 4
//! max_jobs = 64
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenancy_gate::GateConfig;
use thiserror::Error;

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub gate: GateConfig,
    pub fetch: FetchConfig,
    pub provision: ProvisionConfig,
    pub store: StoreCallConfig,
    pub baselines: BaselineConfig,
}

impl CoreConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Admission control for baseline-hour fetches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum concurrent fetches. Zero is treated as one.
    pub max_in_flight: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { max_in_flight: 16 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Delete the resources already created when a later provisioning step
    /// fails. Off by default: partial tenants are left for the caller to
    /// repair.
    pub compensate_on_failure: bool,
}

/// Deadline applied to each individual datastore call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreCallConfig {
    pub timeout_ms: u64,
}

impl StoreCallConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreCallConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// Bulk baseline writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Most items one bulk request may carry.
    pub batch_size: usize,
    /// Worker tasks draining the bulk job queue.
    pub workers: usize,
    /// Bulk jobs that may wait in the queue before submitters block.
    pub max_jobs: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            workers: 4,
            max_jobs: 64,
        }
    }
}
