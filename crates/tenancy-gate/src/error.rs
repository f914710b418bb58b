/// Errors produced by the authorization gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The caller's roles are not in the operation's allowed list.
    #[error("{operation} operation not authorized for role: {roles}")]
    Unauthorized { operation: String, roles: String },
}

impl GateError {
    pub fn unauthorized(operation: impl Into<String>, roles: impl Into<String>) -> Self {
        Self::Unauthorized {
            operation: operation.into(),
            roles: roles.into(),
        }
    }
}

/// Result alias for gate checks.
pub type GateResult<T> = Result<T, GateError>;
