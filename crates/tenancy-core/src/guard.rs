//! Referential integrity checks before deletes.
//!
//! References between resources are plain ID strings, so nothing in the
//! datastore stops a referenced document from being deleted. The guard keeps
//! a registry of [`ReferenceScanner`]s per target kind and refuses a delete
//! while any scanner finds a referrer.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tenancy_store::{Collection, Datastore, StoreResult};
use tenancy_types::{
    Card, Dashboard, Document, Ref, ReportScheduleConfig, ResourceKind, TenantId, ThresholdProfile,
};
use tracing::{debug, warn};

use crate::deadline::within;
use crate::error::{CoreError, CoreResult};

/// Finds documents of one kind that reference a target through one field.
#[async_trait]
pub trait ReferenceScanner: Send + Sync {
    /// Kind of the documents holding the reference.
    fn referencing_kind(&self) -> ResourceKind;

    /// JSON name of the referencing field.
    fn field(&self) -> &'static str;

    /// IDs of documents in `tenant` whose field points at `target_id`.
    async fn find_referrers(&self, tenant: &TenantId, target_id: &str) -> StoreResult<Vec<String>>;
}

/// Scans a collection of `S` for [`Ref<T>`]s extracted by a plain function.
pub struct FieldScanner<S: Document, T> {
    collection: Arc<dyn Collection<S>>,
    field: &'static str,
    refs: fn(&S) -> Vec<&Ref<T>>,
}

impl<S: Document, T> FieldScanner<S, T> {
    pub fn new(
        collection: Arc<dyn Collection<S>>,
        field: &'static str,
        refs: fn(&S) -> Vec<&Ref<T>>,
    ) -> Self {
        Self {
            collection,
            field,
            refs,
        }
    }
}

#[async_trait]
impl<S: Document, T: 'static> ReferenceScanner for FieldScanner<S, T> {
    fn referencing_kind(&self) -> ResourceKind {
        S::KIND
    }

    fn field(&self) -> &'static str {
        self.field
    }

    async fn find_referrers(&self, tenant: &TenantId, target_id: &str) -> StoreResult<Vec<String>> {
        let docs = self.collection.list_all(tenant).await?;
        Ok(docs
            .iter()
            .filter(|doc| (self.refs)(doc).iter().any(|r| r.points_to(target_id)))
            .map(|doc| doc.id().to_string())
            .collect())
    }
}

/// Registry of reference scanners, keyed by the kind being deleted.
pub struct IntegrityGuard {
    scanners: BTreeMap<ResourceKind, Vec<Arc<dyn ReferenceScanner>>>,
    call_timeout: Duration,
}

impl IntegrityGuard {
    /// A guard with no registered references.
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            scanners: BTreeMap::new(),
            call_timeout,
        }
    }

    /// The guard for the standard resource graph:
    ///
    /// | target           | referrer               | field              |
    /// |------------------|------------------------|--------------------|
    /// | ThresholdProfile | Dashboard              | `thresholdProfile` |
    /// | ThresholdProfile | ReportScheduleConfig   | `thresholdProfile` |
    /// | Card             | Dashboard              | `cards`            |
    pub fn for_datastore(store: &Datastore, call_timeout: Duration) -> Self {
        let mut guard = Self::new(call_timeout);
        guard.register(
            ResourceKind::ThresholdProfile,
            Arc::new(FieldScanner::<_, ThresholdProfile>::new(
                store.dashboards(),
                "thresholdProfile",
                dashboard_profile,
            )),
        );
        guard.register(
            ResourceKind::ThresholdProfile,
            Arc::new(FieldScanner::<_, ThresholdProfile>::new(
                store.report_schedules(),
                "thresholdProfile",
                report_profile,
            )),
        );
        guard.register(
            ResourceKind::Card,
            Arc::new(FieldScanner::<_, Card>::new(
                store.dashboards(),
                "cards",
                dashboard_cards,
            )),
        );
        guard
    }

    /// Add a scanner that must come back empty before `target` can be
    /// deleted. Scanners run in registration order.
    pub fn register(&mut self, target: ResourceKind, scanner: Arc<dyn ReferenceScanner>) {
        self.scanners.entry(target).or_default().push(scanner);
    }

    pub fn scanners_for(&self, target: ResourceKind) -> usize {
        self.scanners.get(&target).map_or(0, Vec::len)
    }

    /// Fail with [`CoreError::IntegrityViolation`] naming the first referrer
    /// found, or succeed when nothing references `id`.
    ///
    /// The scan is repeated on every call; a later retry succeeds once the
    /// referrers are gone.
    pub async fn check_deletable(
        &self,
        kind: ResourceKind,
        tenant: &TenantId,
        id: &str,
    ) -> CoreResult<()> {
        let Some(scanners) = self.scanners.get(&kind) else {
            return Ok(());
        };
        for scanner in scanners {
            let referrers = within(
                self.call_timeout,
                scanner.referencing_kind(),
                "scan",
                scanner.find_referrers(tenant, id),
            )
            .await
            .map_err(|e| {
                e.context(format!(
                    "unable to check {} references to {} {id}",
                    scanner.referencing_kind().display_name(),
                    kind.display_name()
                ))
            })?;

            if let Some(first) = referrers.first() {
                warn!(
                    target_kind = %kind,
                    target_id = id,
                    referrer_kind = %scanner.referencing_kind(),
                    referrer_id = %first,
                    field = scanner.field(),
                    "delete blocked by reference"
                );
                return Err(CoreError::IntegrityViolation(format!(
                    "unable to delete {} {id}: still referenced by {} {first} ({})",
                    kind.display_name(),
                    scanner.referencing_kind().display_name(),
                    scanner.field()
                )));
            }
        }
        debug!(target_kind = %kind, target_id = id, "no references, delete allowed");
        Ok(())
    }
}

fn dashboard_profile(d: &Dashboard) -> Vec<&Ref<ThresholdProfile>> {
    vec![&d.threshold_profile]
}

fn report_profile(r: &ReportScheduleConfig) -> Vec<&Ref<ThresholdProfile>> {
    vec![&r.threshold_profile]
}

fn dashboard_cards(d: &Dashboard) -> Vec<&Ref<Card>> {
    d.cards.iter().collect()
}

impl std::fmt::Debug for IntegrityGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let targets: Vec<_> = self.scanners.keys().collect();
        f.debug_struct("IntegrityGuard")
            .field("targets", &targets)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}
