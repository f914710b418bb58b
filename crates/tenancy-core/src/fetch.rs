//! Admission control for baseline-hour lookups.
//!
//! Dashboards fan out one lookup per monitored object and hour. The
//! [`LimitedFetchManager`] caps how many of those reach the datastore at
//! once; callers beyond the cap wait for a slot instead of failing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tenancy_store::{BaselineReader, Datastore, ErrorClass, StoreError, StoreResult};
use tenancy_types::{HourOfWeek, MetricBaselineHour, ResourceKind, TenantId};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::config::FetchConfig;

/// Bounds concurrent [`BaselineReader::get_hour`] calls with a semaphore.
///
/// Each fetch holds exactly one permit for the duration of the underlying
/// call. The permit is released when the call returns, fails, or is
/// cancelled. Results are passed through untouched.
///
/// Waiting for a slot never times out. An optional call timeout applies
/// only to the store call once admitted.
#[derive(Clone)]
pub struct LimitedFetchManager {
    reader: Arc<dyn BaselineReader>,
    slots: Arc<Semaphore>,
    limit: usize,
    call_timeout: Option<Duration>,
}

impl LimitedFetchManager {
    /// A manager admitting at most `max_in_flight` concurrent fetches
    /// (at least one).
    pub fn new(reader: Arc<dyn BaselineReader>, max_in_flight: usize) -> Self {
        let limit = max_in_flight.max(1);
        Self {
            reader,
            slots: Arc::new(Semaphore::new(limit)),
            limit,
            call_timeout: None,
        }
    }

    pub fn with_call_timeout(mut self, limit: Duration) -> Self {
        self.call_timeout = Some(limit);
        self
    }

    pub fn from_config(reader: Arc<dyn BaselineReader>, config: &FetchConfig) -> Self {
        Self::new(reader, config.max_in_flight)
    }

    /// Fetch one baseline hour, waiting for a free slot first.
    pub async fn fetch(
        &self,
        tenant: &TenantId,
        monitored_object_id: &str,
        hour: HourOfWeek,
    ) -> StoreResult<MetricBaselineHour> {
        let _permit = self.slots.acquire().await.map_err(|_| {
            StoreError::Backend(format!(
                "{} fetch manager is closed",
                ResourceKind::MetricBaseline.display_name()
            ))
        })?;
        trace!(
            tenant = %tenant,
            monitored_object_id,
            hour = hour.get(),
            available = self.slots.available_permits(),
            "baseline fetch admitted"
        );
        let call = self.reader.get_hour(tenant, monitored_object_id, hour);
        match self.call_timeout {
            None => call.await,
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                StoreError::Backend(format!(
                    "{} fetch timed out after {}ms",
                    ResourceKind::MetricBaseline.display_name(),
                    limit.as_millis()
                ))
            })?,
        }
    }

    /// Fetch the requested hours of several monitored objects at once.
    ///
    /// Every lookup goes through [`Self::fetch`], so the fan-out never
    /// exceeds the slot limit. Hours that are not stored are left out, or
    /// returned as empty unsaved hour documents when `add_not_found` is set
    /// so the caller can fill them in and write them back. Any other
    /// failure fails the whole lookup. Results are ordered by monitored
    /// object, then hour.
    pub async fn fetch_many(
        &self,
        tenant: &TenantId,
        requested: &BTreeMap<String, Vec<HourOfWeek>>,
        add_not_found: bool,
    ) -> StoreResult<Vec<MetricBaselineHour>> {
        let mut lookups = JoinSet::new();
        for (monitored_object_id, hours) in requested {
            let hours: BTreeSet<HourOfWeek> = hours.iter().copied().collect();
            for hour in hours {
                let manager = self.clone();
                let tenant = tenant.clone();
                let monitored_object_id = monitored_object_id.clone();
                lookups.spawn(async move {
                    let result = manager.fetch(&tenant, &monitored_object_id, hour).await;
                    (monitored_object_id, hour, result)
                });
            }
        }

        let mut found = Vec::with_capacity(lookups.len());
        let mut missing = 0usize;
        while let Some(joined) = lookups.join_next().await {
            let (monitored_object_id, hour, result) = joined
                .map_err(|e| StoreError::Backend(format!("baseline lookup task failed: {e}")))?;
            match result {
                Ok(doc) => found.push(doc),
                Err(e) if e.class() == ErrorClass::NotFound => {
                    missing += 1;
                    if add_not_found {
                        found.push(MetricBaselineHour::empty(
                            tenant.clone(),
                            monitored_object_id,
                            hour,
                        ));
                    }
                }
                Err(e) => return Err(e),
            }
        }
        found.sort_by(|a, b| {
            (&a.monitored_object_id, a.hour_of_week).cmp(&(&b.monitored_object_id, b.hour_of_week))
        });
        debug!(tenant = %tenant, objects = requested.len(), returned = found.len(), missing, "baseline hours fetched");
        Ok(found)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

/// The fetch manager for one datastore's baseline collection.
pub fn create_limited_fetch_manager(store: &Datastore, config: &FetchConfig) -> LimitedFetchManager {
    LimitedFetchManager::from_config(Arc::new(store.baselines()), config)
}

#[async_trait]
impl BaselineReader for LimitedFetchManager {
    async fn get_hour(
        &self,
        tenant: &TenantId,
        monitored_object_id: &str,
        hour: HourOfWeek,
    ) -> StoreResult<MetricBaselineHour> {
        self.fetch(tenant, monitored_object_id, hour).await
    }
}

impl std::fmt::Debug for LimitedFetchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitedFetchManager")
            .field("limit", &self.limit)
            .field("available", &self.available())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}
