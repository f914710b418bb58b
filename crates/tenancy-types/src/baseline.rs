//! Metric baselines: per monitored object, per hour of the week.
//!
//! A baseline is stored as one revisioned document per
//! `(tenant, monitored object, hour of week)` so that writers touching
//! different hours of the same object never contend on a shared revision.
//! [`MetricBaseline`] is the assembled sparse view across all hours.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::ResourceMeta;
use crate::error::TypeError;
use crate::identity::TenantId;
use crate::impl_document;
use crate::kind::ResourceKind;

/// Number of hours in a week; valid hours are `0..HOURS_PER_WEEK`.
pub const HOURS_PER_WEEK: u32 = 168;

/// An hour of the week, 0 (Sunday 00:00) through 167.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct HourOfWeek(u8);

impl HourOfWeek {
    pub fn new(hour: u32) -> Result<Self, TypeError> {
        if hour < HOURS_PER_WEEK {
            Ok(Self(hour as u8))
        } else {
            Err(TypeError::InvalidHourOfWeek(hour))
        }
    }

    pub fn get(&self) -> u32 {
        u32::from(self.0)
    }
}

impl TryFrom<u32> for HourOfWeek {
    type Error = TypeError;

    fn try_from(hour: u32) -> Result<Self, Self::Error> {
        Self::new(hour)
    }
}

impl From<HourOfWeek> for u32 {
    fn from(hour: HourOfWeek) -> Self {
        hour.get()
    }
}

impl fmt::Display for HourOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Baseline statistics for one metric and direction in one hour.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricBaselineData {
    pub metric: String,
    #[serde(default)]
    pub direction: String,
    pub hour_of_week: HourOfWeek,
    #[serde(default)]
    pub average: f64,
    #[serde(default)]
    pub std_dev: f64,
    #[serde(default)]
    pub count: u64,
}

impl MetricBaselineData {
    /// Entries with the same key replace each other on merge.
    pub fn same_series(&self, other: &Self) -> bool {
        self.metric == other.metric && self.direction == other.direction
    }
}

/// Storage ID for one hour of one monitored object's baseline.
pub fn baseline_hour_id(monitored_object_id: &str, hour: HourOfWeek) -> String {
    format!("{monitored_object_id}_{hour}")
}

/// One stored hour of a monitored object's baseline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricBaselineHour {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub monitored_object_id: String,
    pub hour_of_week: HourOfWeek,
    pub baselines: Vec<MetricBaselineData>,
}

impl MetricBaselineHour {
    /// An hour document with no entries yet.
    pub fn empty(tenant: TenantId, monitored_object_id: impl Into<String>, hour: HourOfWeek) -> Self {
        let monitored_object_id = monitored_object_id.into();
        Self {
            meta: ResourceMeta::with_id(
                ResourceKind::MetricBaseline,
                tenant,
                baseline_hour_id(&monitored_object_id, hour),
            ),
            monitored_object_id,
            hour_of_week: hour,
            baselines: Vec::new(),
        }
    }

    /// Fold `incoming` into this hour: an entry for an existing
    /// metric/direction replaces it, anything else is appended.
    pub fn merge_entries(&mut self, incoming: &[MetricBaselineData]) {
        for entry in incoming {
            match self.baselines.iter_mut().find(|e| e.same_series(entry)) {
                Some(existing) => *existing = entry.clone(),
                None => self.baselines.push(entry.clone()),
            }
        }
    }
}

impl_document!(
    MetricBaselineHour,
    ResourceKind::MetricBaseline,
    ["monitoredObjectId", "hourOfWeek"]
);

/// All stored hours for one monitored object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricBaseline {
    pub tenant_id: TenantId,
    pub monitored_object_id: String,
    pub hours: BTreeMap<HourOfWeek, Vec<MetricBaselineData>>,
}

impl MetricBaseline {
    /// Assemble the view from stored hour documents.
    pub fn from_hours(
        tenant_id: TenantId,
        monitored_object_id: impl Into<String>,
        hours: impl IntoIterator<Item = MetricBaselineHour>,
    ) -> Self {
        Self {
            tenant_id,
            monitored_object_id: monitored_object_id.into(),
            hours: hours
                .into_iter()
                .map(|h| (h.hour_of_week, h.baselines))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }
}

/// A baseline update as delivered by the ingestion topic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineUpdate {
    pub tenant_id: TenantId,
    pub monitored_object_id: String,
    #[serde(default)]
    pub baselines: Vec<MetricBaselineData>,
}

impl BaselineUpdate {
    /// Split the entries by the hour they belong to.
    pub fn by_hour(&self) -> BTreeMap<HourOfWeek, Vec<MetricBaselineData>> {
        let mut grouped: BTreeMap<HourOfWeek, Vec<MetricBaselineData>> = BTreeMap::new();
        for entry in &self.baselines {
            grouped.entry(entry.hour_of_week).or_default().push(entry.clone());
        }
        grouped
    }
}

/// One item of a bulk baseline write: the entries for a single hour of a
/// single monitored object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkBaselineEntry {
    pub monitored_object_id: String,
    pub hour_of_week: HourOfWeek,
    #[serde(default)]
    pub baselines: Vec<MetricBaselineData>,
}

/// Per-item outcome of a bulk write.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkOperationResult {
    pub ok: bool,
    pub id: String,
    pub rev: String,
    /// Error class, empty on success.
    pub error: String,
    pub reason: String,
}

impl BulkOperationResult {
    pub fn success(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            ok: true,
            id: id.into(),
            rev: rev.into(),
            ..Default::default()
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: error.into(),
            reason: reason.into(),
            ..Default::default()
        }
    }
}
