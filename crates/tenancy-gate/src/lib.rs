//! Role-based authorization gate.
//!
//! Every provisioning operation is declared with an ordered list of allowed
//! roles (see [`roles`]). The caller's roles arrive in the
//! [`roles::ROLE_HEADER`] header; the gate compares the two once, before any
//! datastore access, and a denial is terminal.
//!
//! # Rules
//!
//! 1. A caller holding the `system` role is always admitted.
//! 2. Otherwise at least one of the caller's roles must be in the list.
//! 3. A disabled gate ([`GateConfig::enabled`] = `false`) admits everyone.

pub mod config;
pub mod error;
pub mod gate;
pub mod roles;

pub use config::GateConfig;
pub use error::{GateError, GateResult};
pub use gate::{AllowAll, AuthorizationGate, RoleGate};
pub use roles::RoleHeader;
