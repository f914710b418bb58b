//! Metric baseline writes and the ingestion consumer.
//!
//! Updates arrive as [`BaselineUpdate`] messages carrying entries for any
//! number of hours. Each hour is read, merged, and written back
//! independently under that hour's revision. A stale revision is reported
//! as a conflict and not retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tenancy_store::{BaselineReader, BaselineStore, ErrorClass, StoreError};
use tenancy_types::{
    baseline_hour_id, BaselineUpdate, BulkBaselineEntry, BulkOperationResult, Document,
    HourOfWeek, MetricBaseline, MetricBaselineData, MetricBaselineHour, ResourceKind, TenantId,
};
use tracing::{debug, error, info, warn};

use crate::deadline::within;
use crate::error::{CoreError, CoreResult};

const KIND: ResourceKind = ResourceKind::MetricBaseline;

/// Bulk requests larger than this are refused unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Per-hour baseline reads and writes with per-call deadlines.
#[derive(Clone, Debug)]
pub struct BaselineService {
    store: BaselineStore,
    call_timeout: Duration,
    batch_size: usize,
}

impl BaselineService {
    pub fn new(store: BaselineStore, call_timeout: Duration) -> Self {
        Self {
            store,
            call_timeout,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Merge `entries` into one stored hour, creating the hour if absent.
    ///
    /// The tenant and monitored object must be named and every entry must
    /// belong to `hour`. The read and the write are separate calls; when
    /// another writer updates the hour in between, the write fails with
    /// [`CoreError::Conflict`].
    pub async fn update_hour(
        &self,
        tenant: &TenantId,
        monitored_object_id: &str,
        hour: HourOfWeek,
        entries: &[MetricBaselineData],
    ) -> CoreResult<MetricBaselineHour> {
        require_target(tenant, monitored_object_id)?;
        if let Some(stray) = entries.iter().find(|e| e.hour_of_week != hour) {
            return Err(CoreError::BadRequest(format!(
                "entry {} is for hour {}, expected {hour}",
                stray.metric, stray.hour_of_week
            )));
        }

        let fetched = tokio::time::timeout(
            self.call_timeout,
            self.store.get_hour(tenant, monitored_object_id, hour),
        )
        .await
        .map_err(|_| timed_out("get", self.call_timeout))?;

        match fetched {
            Ok(mut doc) => {
                let expected = doc.meta.rev.clone();
                doc.merge_entries(entries);
                let stored = within(
                    self.call_timeout,
                    KIND,
                    "update",
                    self.store.update_hour(doc, &expected),
                )
                .await?;
                debug!(tenant = %tenant, monitored_object_id, hour = hour.get(), rev = %stored.meta.rev, "baseline hour merged");
                Ok(stored)
            }
            Err(e) if e.class() == ErrorClass::NotFound => {
                let mut doc = MetricBaselineHour::empty(tenant.clone(), monitored_object_id, hour);
                doc.merge_entries(entries);
                let stored =
                    within(self.call_timeout, KIND, "create", self.store.create_hour(doc)).await?;
                debug!(tenant = %tenant, monitored_object_id, hour = hour.get(), "baseline hour created");
                Ok(stored)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply every hour of `update`, continuing past failed hours.
    ///
    /// Returns the per-hour outcomes in hour order.
    pub async fn apply_update(
        &self,
        update: &BaselineUpdate,
    ) -> Vec<(HourOfWeek, CoreResult<MetricBaselineHour>)> {
        let mut outcomes = Vec::new();
        for (hour, entries) in update.by_hour() {
            let outcome = self
                .update_hour(&update.tenant_id, &update.monitored_object_id, hour, &entries)
                .await;
            outcomes.push((hour, outcome));
        }
        outcomes
    }

    /// Merge each item of a bulk request into its hour.
    ///
    /// A request over the batch size is refused as a whole. Otherwise every
    /// item is attempted and reported on its own, in request order; one
    /// failed item does not stop the rest.
    pub async fn bulk_update(
        &self,
        tenant: &TenantId,
        entries: &[BulkBaselineEntry],
    ) -> CoreResult<Vec<BulkOperationResult>> {
        self.check_batch(tenant, entries.len())?;

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = baseline_hour_id(&entry.monitored_object_id, entry.hour_of_week);
            let result = match self
                .update_hour(tenant, &entry.monitored_object_id, entry.hour_of_week, &entry.baselines)
                .await
            {
                Ok(doc) => BulkOperationResult::success(doc.id(), doc.rev().as_str()),
                Err(e) => {
                    warn!(tenant = %tenant, id = %id, error = %e, "bulk baseline item not applied");
                    BulkOperationResult::failure(id, e.kind().to_string(), e.to_string())
                }
            };
            results.push(result);
        }
        let applied = results.iter().filter(|r| r.ok).count();
        info!(tenant = %tenant, items = results.len(), applied, "bulk baseline update complete");
        Ok(results)
    }

    /// Refuse a bulk request before anything is written.
    pub(crate) fn check_batch(&self, tenant: &TenantId, items: usize) -> CoreResult<()> {
        if tenant.is_empty() {
            return Err(CoreError::BadRequest(
                "bulk baseline update requires a tenantId".into(),
            ));
        }
        if items > self.batch_size {
            return Err(CoreError::BadRequest(format!(
                "too many monitored objects in bulk request: limit is {} but request contains {items}",
                self.batch_size
            )));
        }
        Ok(())
    }

    /// Every stored hour for one monitored object. NotFound when none.
    pub async fn get_baseline(
        &self,
        tenant: &TenantId,
        monitored_object_id: &str,
    ) -> CoreResult<MetricBaseline> {
        let hours = within(
            self.call_timeout,
            KIND,
            "list",
            self.store.hours_for_monitored_object(tenant, monitored_object_id),
        )
        .await?;
        if hours.is_empty() {
            return Err(StoreError::not_found(KIND, monitored_object_id).into());
        }
        Ok(MetricBaseline::from_hours(
            tenant.clone(),
            monitored_object_id,
            hours,
        ))
    }

    /// Remove every stored hour for one monitored object.
    pub async fn delete_baseline(
        &self,
        tenant: &TenantId,
        monitored_object_id: &str,
    ) -> CoreResult<MetricBaseline> {
        let removed = within(
            self.call_timeout,
            KIND,
            "delete",
            self.store.delete_for_monitored_object(tenant, monitored_object_id),
        )
        .await?;
        info!(tenant = %tenant, monitored_object_id, hours = removed.len(), "baseline deleted");
        Ok(MetricBaseline::from_hours(
            tenant.clone(),
            monitored_object_id,
            removed,
        ))
    }

    pub fn store(&self) -> &BaselineStore {
        &self.store
    }
}

/// Baseline hours always belong to a named tenant and monitored object;
/// the empty tenant is the global scope, which only holds tenants.
pub(crate) fn require_target(tenant: &TenantId, monitored_object_id: &str) -> CoreResult<()> {
    if tenant.is_empty() || monitored_object_id.trim().is_empty() {
        return Err(CoreError::BadRequest(
            "baseline update requires tenantId and monitoredObjectId".into(),
        ));
    }
    Ok(())
}

fn timed_out(action: &str, limit: Duration) -> CoreError {
    CoreError::Internal(format!(
        "{action} {} timed out after {}ms",
        KIND.display_name(),
        limit.as_millis()
    ))
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// What happened to one ingested message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    /// `false` when the payload could not be decoded.
    pub decoded: bool,
    pub applied_hours: usize,
    /// Hours whose write failed, with the error text.
    pub failed_hours: Vec<(HourOfWeek, String)>,
}

impl IngestOutcome {
    pub fn is_clean(&self) -> bool {
        self.decoded && self.failed_hours.is_empty()
    }
}

/// Decodes and applies one raw baseline message.
#[async_trait]
pub trait BaselineIngestor: Send + Sync {
    async fn ingest(&self, raw: &[u8]) -> IngestOutcome;
}

#[async_trait]
impl BaselineIngestor for BaselineService {
    async fn ingest(&self, raw: &[u8]) -> IngestOutcome {
        let update: BaselineUpdate = match serde_json::from_slice(raw) {
            Ok(update) => update,
            Err(e) => {
                error!(error = %e, bytes = raw.len(), "unable to decode baseline update");
                return IngestOutcome::default();
            }
        };

        let mut outcome = IngestOutcome {
            decoded: true,
            ..Default::default()
        };
        for (hour, result) in self.apply_update(&update).await {
            match result {
                Ok(_) => outcome.applied_hours += 1,
                Err(e) => {
                    warn!(
                        tenant = %update.tenant_id,
                        monitored_object_id = %update.monitored_object_id,
                        hour = hour.get(),
                        error = %e,
                        "baseline hour not applied"
                    );
                    outcome.failed_hours.push((hour, e.to_string()));
                }
            }
        }
        outcome
    }
}

/// Decides whether a message is acknowledged after ingestion.
pub trait AckPolicy: Send + Sync {
    fn should_ack(&self, outcome: &IngestOutcome) -> bool;
}

/// Acknowledge every message, whatever happened to it.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysAck;

impl AckPolicy for AlwaysAck {
    fn should_ack(&self, _outcome: &IngestOutcome) -> bool {
        true
    }
}

/// Acknowledge only messages that decoded and applied in full.
#[derive(Clone, Copy, Debug, Default)]
pub struct AckWhenClean;

impl AckPolicy for AckWhenClean {
    fn should_ack(&self, outcome: &IngestOutcome) -> bool {
        outcome.is_clean()
    }
}

/// Entry point for the message transport.
pub struct BaselineConsumer {
    ingestor: Arc<dyn BaselineIngestor>,
    policy: Arc<dyn AckPolicy>,
}

impl BaselineConsumer {
    /// A consumer that acknowledges every message.
    pub fn new(ingestor: Arc<dyn BaselineIngestor>) -> Self {
        Self::with_policy(ingestor, Arc::new(AlwaysAck))
    }

    pub fn with_policy(ingestor: Arc<dyn BaselineIngestor>, policy: Arc<dyn AckPolicy>) -> Self {
        Self { ingestor, policy }
    }

    /// Ingest one raw message and return whether to acknowledge it.
    ///
    /// With the default policy this is always `true`: malformed payloads
    /// and failed writes are logged and dropped, never redelivered.
    pub async fn handle_incoming_baseline(&self, raw: &[u8]) -> bool {
        let outcome = self.ingestor.ingest(raw).await;
        let ack = self.policy.should_ack(&outcome);
        debug!(
            decoded = outcome.decoded,
            applied_hours = outcome.applied_hours,
            failed_hours = outcome.failed_hours.len(),
            ack,
            "baseline message handled"
        );
        ack
    }
}

impl std::fmt::Debug for BaselineConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaselineConsumer").finish_non_exhaustive()
    }
}
