use std::sync::Arc;

use async_trait::async_trait;
use tenancy_types::{baseline_hour_id, Document, HourOfWeek, MetricBaselineHour, Rev, TenantId};

use crate::error::{StoreError, StoreResult};
use crate::traits::Collection;

/// Read side of the per-hour baseline path.
///
/// This is the hot lookup that dashboards fan out over; it is kept as its
/// own trait so admission control can wrap it without knowing the backend.
#[async_trait]
pub trait BaselineReader: Send + Sync {
    async fn get_hour(
        &self,
        tenant: &TenantId,
        monitored_object_id: &str,
        hour: HourOfWeek,
    ) -> StoreResult<MetricBaselineHour>;
}

/// Per-hour baseline operations over a [`MetricBaselineHour`] collection.
///
/// Each hour of each monitored object is its own document, addressed by
/// [`baseline_hour_id`], so revisions guard single hours.
#[derive(Clone)]
pub struct BaselineStore {
    hours: Arc<dyn Collection<MetricBaselineHour>>,
}

impl BaselineStore {
    pub fn new(hours: Arc<dyn Collection<MetricBaselineHour>>) -> Self {
        Self { hours }
    }

    /// Store a new hour document. Conflict if the hour already exists.
    pub async fn create_hour(&self, doc: MetricBaselineHour) -> StoreResult<MetricBaselineHour> {
        self.hours.create(doc).await
    }

    /// Replace an hour document if its revision still equals `expected`.
    pub async fn update_hour(
        &self,
        doc: MetricBaselineHour,
        expected: &Rev,
    ) -> StoreResult<MetricBaselineHour> {
        self.hours.update(doc, expected).await
    }

    /// Every stored hour for one monitored object, ordered by hour.
    pub async fn hours_for_monitored_object(
        &self,
        tenant: &TenantId,
        monitored_object_id: &str,
    ) -> StoreResult<Vec<MetricBaselineHour>> {
        let mut hours: Vec<MetricBaselineHour> = self
            .hours
            .list_all(tenant)
            .await?
            .into_iter()
            .filter(|h| h.monitored_object_id == monitored_object_id)
            .collect();
        hours.sort_by_key(|h| h.hour_of_week);
        Ok(hours)
    }

    /// Remove every hour for one monitored object and return what was
    /// removed. NotFound when nothing was stored.
    pub async fn delete_for_monitored_object(
        &self,
        tenant: &TenantId,
        monitored_object_id: &str,
    ) -> StoreResult<Vec<MetricBaselineHour>> {
        let hours = self
            .hours_for_monitored_object(tenant, monitored_object_id)
            .await?;
        if hours.is_empty() {
            return Err(StoreError::not_found(
                MetricBaselineHour::KIND,
                monitored_object_id,
            ));
        }
        let mut removed = Vec::with_capacity(hours.len());
        for hour in hours {
            removed.push(self.hours.delete(tenant, hour.id()).await?);
        }
        Ok(removed)
    }
}

#[async_trait]
impl BaselineReader for BaselineStore {
    async fn get_hour(
        &self,
        tenant: &TenantId,
        monitored_object_id: &str,
        hour: HourOfWeek,
    ) -> StoreResult<MetricBaselineHour> {
        self.hours
            .get(tenant, &baseline_hour_id(monitored_object_id, hour))
            .await
    }
}

impl std::fmt::Debug for BaselineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaselineStore").finish_non_exhaustive()
    }
}
