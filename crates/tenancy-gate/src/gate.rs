use tracing::{debug, warn};

use crate::config::GateConfig;
use crate::error::{GateError, GateResult};
use crate::roles::{RoleHeader, SYSTEM};

/// Decides whether a caller may run an operation.
///
/// Consulted exactly once per operation, before any datastore access. The
/// trait is object-safe and `Send + Sync` so the provisioning core can hold
/// it as `Arc<dyn AuthorizationGate>`.
pub trait AuthorizationGate: Send + Sync {
    /// `true` when `caller` may run an operation declared with `allowed`.
    fn is_authorized(&self, allowed: &[&str], caller: &RoleHeader) -> bool;

    /// [`Self::is_authorized`] as a result, naming the operation on denial.
    fn authorize(&self, operation: &str, allowed: &[&str], caller: &RoleHeader) -> GateResult<()> {
        if self.is_authorized(allowed, caller) {
            debug!(operation, roles = %caller, "authorized");
            Ok(())
        } else {
            warn!(operation, roles = %caller, "operation not authorized");
            Err(GateError::unauthorized(operation, caller.to_string()))
        }
    }
}

/// Gate that admits a caller when any of its roles is in the allowed list.
///
/// The `system` role is always admitted, and a disabled gate admits
/// everyone.
#[derive(Clone, Debug, Default)]
pub struct RoleGate {
    config: GateConfig,
}

impl RoleGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

impl AuthorizationGate for RoleGate {
    fn is_authorized(&self, allowed: &[&str], caller: &RoleHeader) -> bool {
        if !self.config.enabled {
            return true;
        }
        if caller.contains(SYSTEM) {
            return true;
        }
        caller.roles().any(|role| allowed.contains(&role))
    }
}

/// Gate that admits everyone.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl AuthorizationGate for AllowAll {
    fn is_authorized(&self, _allowed: &[&str], _caller: &RoleHeader) -> bool {
        true
    }
}
