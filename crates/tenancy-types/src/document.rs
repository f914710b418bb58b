use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::identity::TenantId;
use crate::kind::ResourceKind;
use crate::revision::Rev;

/// JSON keys of [`ResourceMeta`] that no client payload may change.
pub const META_IDENTITY_FIELDS: [&str; 6] = [
    "_id",
    "_rev",
    "datatype",
    "tenantId",
    "createdTimestamp",
    "lastModifiedTimestamp",
];

/// Bookkeeping fields shared by every stored document.
///
/// Flattened into each resource record so the wire shape stays
/// `{"_id": .., "_rev": .., "datatype": .., "tenantId": .., ...attributes}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMeta {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Rev::is_empty")]
    pub rev: Rev,
    #[serde(default)]
    pub datatype: String,
    #[serde(default, skip_serializing_if = "TenantId::is_empty")]
    pub tenant_id: TenantId,
    #[serde(default)]
    pub created_timestamp: i64,
    #[serde(default)]
    pub last_modified_timestamp: i64,
}

impl ResourceMeta {
    /// Metadata for a not-yet-stored document of `kind` owned by `tenant`.
    pub fn new(kind: ResourceKind, tenant: TenantId) -> Self {
        Self {
            datatype: kind.datatype().to_string(),
            tenant_id: tenant,
            ..Default::default()
        }
    }

    /// Same as [`Self::new`] with a caller-chosen ID.
    pub fn with_id(kind: ResourceKind, tenant: TenantId, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(kind, tenant)
        }
    }
}

/// A record the datastore can hold.
///
/// Implementors expose their shared metadata and declare which of their own
/// attributes identify them (and so must survive a merge-patch untouched).
pub trait Document:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The kind discriminator for this record type.
    const KIND: ResourceKind;

    /// Kind-specific JSON keys that a patch may never change, in addition to
    /// [`META_IDENTITY_FIELDS`].
    const IDENTITY_FIELDS: &'static [&'static str] = &[];

    fn meta(&self) -> &ResourceMeta;

    fn meta_mut(&mut self) -> &mut ResourceMeta;

    fn id(&self) -> &str {
        &self.meta().id
    }

    fn rev(&self) -> &Rev {
        &self.meta().rev
    }

    fn tenant_id(&self) -> &TenantId {
        &self.meta().tenant_id
    }

    /// Scope the store keys this document under: the owning tenant, or the
    /// global scope for kinds that are not tenant-scoped.
    fn scope(&self) -> TenantId {
        if Self::KIND.is_tenant_scoped() {
            self.meta().tenant_id.clone()
        } else {
            TenantId::global()
        }
    }
}

/// Implement [`Document`] for a record with a `meta: ResourceMeta` field.
#[macro_export]
macro_rules! impl_document {
    ($ty:ty, $kind:expr) => {
        $crate::impl_document!($ty, $kind, []);
    };
    ($ty:ty, $kind:expr, [$($field:literal),* $(,)?]) => {
        impl $crate::Document for $ty {
            const KIND: $crate::ResourceKind = $kind;
            const IDENTITY_FIELDS: &'static [&'static str] = &[$($field),*];

            fn meta(&self) -> &$crate::ResourceMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut $crate::ResourceMeta {
                &mut self.meta
            }
        }
    };
}
