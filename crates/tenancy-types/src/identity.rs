use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kind::ResourceKind;

/// Separator the document store places between a datatype and a bare ID
/// when it builds storage-level identifiers (`<datatype>_2_<id>`).
pub const STORAGE_ID_BRIDGE: &str = "_2_";

/// Identity of a tenant.
///
/// Every tenant-scoped resource carries the owning tenant's ID as a foreign
/// key. The empty ID is the *global* scope, used for documents that are not
/// owned by any tenant (the tenant records themselves).
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The global scope (no owning tenant).
    pub fn global() -> Self {
        Self(String::new())
    }

    /// Returns `true` for the global scope.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "TenantId(<global>)")
        } else {
            write!(f, "TenantId({})", self.0)
        }
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Generate a fresh resource identifier (UUID v7, hyphenated).
pub fn new_resource_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Build the storage-level identifier for a bare ID: `<datatype>_2_<id>`.
pub fn storage_id(datatype: &str, id: &str) -> String {
    format!("{datatype}{STORAGE_ID_BRIDGE}{id}")
}

/// Strip a storage-level prefix, returning the bare ID.
///
/// Only a `<datatype>_2_` prefix naming a known [`ResourceKind`] is removed.
/// Any other ID, underscores included, is returned unchanged.
pub fn strip_storage_prefix(id: &str) -> &str {
    match id.split_once(STORAGE_ID_BRIDGE) {
        Some((datatype, bare)) if ResourceKind::from_datatype(datatype).is_some() => bare,
        _ => id,
    }
}
