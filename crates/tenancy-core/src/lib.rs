//! Resource lifecycle core for tenant provisioning.
//!
//! Provides a unified API over the revisioned datastore for outer surfaces
//! (HTTP handlers, the message bus, the `tenancy` CLI). [`TenancyService`]
//! is the main entry point.
//!
//! # Components
//!
//! - [`Provisioner`] -- creates a tenant and its default resources in six
//!   ordered steps, reporting how far it got
//! - [`MergePatch`] / [`apply_patch`] -- partial updates that never touch
//!   identity fields
//! - [`IntegrityGuard`] -- refuses deletes of still-referenced resources
//! - [`LimitedFetchManager`] -- caps concurrent baseline-hour reads
//! - [`BaselineService`] / [`BaselineConsumer`] -- per-hour baseline writes
//!   and the ingestion entry point
//! - [`BulkUpdateManager`] -- queued bulk baseline writes on a worker pool

pub mod baseline;
pub mod bulk;
pub mod config;
mod deadline;
pub mod error;
pub mod fetch;
pub mod guard;
pub mod patch;
pub mod provision;
pub mod service;

pub use baseline::{
    AckPolicy, AckWhenClean, AlwaysAck, BaselineConsumer, BaselineIngestor, BaselineService,
    IngestOutcome, DEFAULT_BATCH_SIZE,
};
pub use bulk::{BulkTicket, BulkUpdateManager};
pub use config::{
    BaselineConfig, ConfigError, CoreConfig, FetchConfig, ProvisionConfig, StoreCallConfig,
};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use fetch::{create_limited_fetch_manager, LimitedFetchManager};
pub use guard::{FieldScanner, IntegrityGuard, ReferenceScanner};
pub use patch::{apply_patch, merge_into, MergePatch};
pub use provision::{ProvisionReport, ProvisionStep, Provisioner};
pub use service::TenancyService;

// Re-export key types
pub use tenancy_gate::{roles, RoleHeader};
pub use tenancy_store::Datastore;
pub use tenancy_types::{Document, Rev, TenantId};
