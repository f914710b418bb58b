use serde::{Deserialize, Serialize};

/// Configuration for the authorization gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// When `false`, every caller is admitted regardless of role. Used for
    /// deployments that sit behind an upstream that already enforces roles.
    pub enabled: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl GateConfig {
    /// A configuration that admits every caller.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }
}
