//! Foundation types for tenant provisioning.
//!
//! This crate provides the identity, revision, and record types shared by
//! every other `tenancy-*` crate.
//!
//! # Key Types
//!
//! - [`TenantId`] — owner key for tenant-scoped resources
//! - [`Rev`] — opaque revision token used for compare-and-swap writes
//! - [`Ref`] — typed reference to another document, stored as a bare ID
//! - [`ResourceKind`] — datatype discriminator and per-tenant cardinality
//! - [`Document`] — trait implemented by every storable record
//! - [`Tenant`], [`ThresholdProfile`], [`Dashboard`], ... — the records
//! - [`MetricBaselineHour`] / [`MetricBaseline`] — per-hour baselines

pub mod baseline;
pub mod document;
pub mod error;
pub mod identity;
pub mod kind;
pub mod reference;
pub mod resources;
pub mod revision;
pub mod temporal;

pub use baseline::{
    baseline_hour_id, BaselineUpdate, BulkBaselineEntry, BulkOperationResult, HourOfWeek,
    MetricBaseline, MetricBaselineData, MetricBaselineHour, HOURS_PER_WEEK,
};
pub use document::{Document, ResourceMeta, META_IDENTITY_FIELDS};
pub use error::TypeError;
pub use identity::{new_resource_id, storage_id, strip_storage_prefix, TenantId, STORAGE_ID_BRIDGE};
pub use kind::{Cardinality, ResourceKind};
pub use reference::Ref;
pub use resources::{
    fold_name, Branding, Card, CardMetric, ConnectorConfig, ConnectorInstance, Dashboard,
    DataCleaningProfile, DataCleaningRule, IngestionProfile, Locale, MetadataConfig,
    MetadataFilter, MetricSelection, ReportScheduleConfig, Tenant, TenantMetadata,
    ThresholdProfile, DEFAULT_THRESHOLD_PROFILE_NAME, STATE_ACTIVE,
};
pub use revision::Rev;
pub use temporal::now_millis;
