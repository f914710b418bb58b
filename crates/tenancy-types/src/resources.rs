//! Tenant and tenant-scoped resource records.
//!
//! Every record flattens a [`ResourceMeta`] and carries its kind-specific
//! attributes with camelCase JSON names. Missing attributes deserialize to
//! their defaults, so partial payloads round-trip through merge-patching.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::ResourceMeta;
use crate::identity::TenantId;
use crate::impl_document;
use crate::kind::ResourceKind;
use crate::reference::Ref;

/// Default lifecycle state for new tenants and cards.
pub const STATE_ACTIVE: &str = "active";

/// Name of the threshold profile every tenant receives at creation.
pub const DEFAULT_THRESHOLD_PROFILE_NAME: &str = "Default";

// ---------------------------------------------------------------------------
// Tenant (global scope)
// ---------------------------------------------------------------------------

/// A tenant. Names are unique across the system, compared case-insensitively.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tenant {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub name: String,
    pub url_subdomain: String,
    pub state: String,
}

impl Tenant {
    pub fn new(name: impl Into<String>, url_subdomain: impl Into<String>) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::Tenant, TenantId::global()),
            name: name.into(),
            url_subdomain: url_subdomain.into(),
            state: STATE_ACTIVE.to_string(),
        }
    }

    /// The tenant's own ID as the owner key for its resources.
    pub fn owner_id(&self) -> TenantId {
        TenantId::new(self.meta.id.clone())
    }

    /// Name normalised for the uniqueness check.
    pub fn folded_name(&self) -> String {
        fold_name(&self.name)
    }
}

/// Normalise a tenant name for case-insensitive comparison.
pub fn fold_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl_document!(Tenant, ResourceKind::Tenant);

/// Per-tenant bookkeeping written as the last provisioning step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantMetadata {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub tenant_name: String,
    pub default_threshold_profile: Ref<ThresholdProfile>,
}

impl TenantMetadata {
    pub fn new(
        tenant: TenantId,
        tenant_name: impl Into<String>,
        default_threshold_profile: Ref<ThresholdProfile>,
    ) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::TenantMetadata, tenant),
            tenant_name: tenant_name.into(),
            default_threshold_profile,
        }
    }
}

impl_document!(TenantMetadata, ResourceKind::TenantMetadata);

// ---------------------------------------------------------------------------
// Presentation: branding, locale, cards, dashboards
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Branding {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub color: String,
    pub logo: String,
}

impl_document!(Branding, ResourceKind::Branding);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Locale {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub intl: String,
    pub moment: String,
    pub timezone: String,
}

impl_document!(Locale, ResourceKind::Locale);

/// A metric plotted on a card.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardMetric {
    pub vendor: String,
    pub metric: String,
    pub monitored_object_types: Vec<String>,
    pub directions: Vec<String>,
    pub unit: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Card {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub name: String,
    pub description: String,
    pub state: String,
    pub metrics: Vec<CardMetric>,
    /// Rendering hints, opaque to the provisioning core.
    pub visualization: Option<Value>,
}

impl Card {
    pub fn new(tenant: TenantId, name: impl Into<String>) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::Card, tenant),
            name: name.into(),
            state: STATE_ACTIVE.to_string(),
            ..Default::default()
        }
    }
}

impl_document!(Card, ResourceKind::Card);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataFilter {
    pub key: String,
    pub values: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dashboard {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub name: String,
    pub category: String,
    pub metadata_filters: Vec<MetadataFilter>,
    /// Card ID to layout position, opaque to the provisioning core.
    pub card_positions: BTreeMap<String, Value>,
    pub threshold_profile: Ref<ThresholdProfile>,
    pub cards: Vec<Ref<Card>>,
}

impl Dashboard {
    pub fn new(
        tenant: TenantId,
        name: impl Into<String>,
        threshold_profile: Ref<ThresholdProfile>,
    ) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::Dashboard, tenant),
            name: name.into(),
            threshold_profile,
            ..Default::default()
        }
    }
}

impl_document!(Dashboard, ResourceKind::Dashboard);

// ---------------------------------------------------------------------------
// Connectors
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorConfig {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub name: String,
    pub connector_type: String,
    pub url: String,
    pub port: u16,
    pub poll_frequency: u32,
    pub zone: String,
    pub connector_instance_id: String,
}

impl_document!(ConnectorConfig, ResourceKind::ConnectorConfig);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorInstance {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub hostname: String,
    pub status: String,
}

impl_document!(ConnectorInstance, ResourceKind::ConnectorInstance);

// ---------------------------------------------------------------------------
// Profiles and configuration created by provisioning
// ---------------------------------------------------------------------------

/// Metadata import configuration. Provisioned empty (no start/end points).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataConfig {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub start_point: String,
    pub end_point: String,
}

impl MetadataConfig {
    pub fn empty(tenant: TenantId) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::MetadataConfig, tenant),
            ..Default::default()
        }
    }
}

impl_document!(MetadataConfig, ResourceKind::MetadataConfig);

/// Thresholds keyed by vendor; the nested shape is opaque to the core.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdProfile {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub name: String,
    pub thresholds: BTreeMap<String, Value>,
}

impl ThresholdProfile {
    pub fn named(tenant: TenantId, name: impl Into<String>) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::ThresholdProfile, tenant),
            name: name.into(),
            thresholds: BTreeMap::new(),
        }
    }

    /// The profile every tenant gets at creation.
    pub fn default_for(tenant: TenantId) -> Self {
        Self::named(tenant, DEFAULT_THRESHOLD_PROFILE_NAME)
    }
}

impl_document!(ThresholdProfile, ResourceKind::ThresholdProfile);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataCleaningRule {
    pub metric_vendor: String,
    pub metric_label: String,
    pub direction: String,
    /// Trigger and clear conditions, opaque to the core.
    pub rule: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataCleaningProfile {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub rules: Vec<DataCleaningRule>,
}

impl DataCleaningProfile {
    pub fn empty(tenant: TenantId) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::DataCleaningProfile, tenant),
            rules: Vec::new(),
        }
    }
}

impl_document!(DataCleaningProfile, ResourceKind::DataCleaningProfile);

/// vendor -> monitored object type -> metric -> enabled
pub type MetricSelection = BTreeMap<String, BTreeMap<String, BTreeMap<String, bool>>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestionProfile {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub metrics: MetricSelection,
}

/// Metrics enabled for every new tenant.
const DEFAULT_INGESTED_METRICS: &[(&str, &str, &[&str])] = &[
    (
        "accedian-twamp",
        "twamp-sf",
        &["delayP95", "jitterP95", "packetsLostPct"],
    ),
    (
        "accedian-twamp",
        "twamp-sl",
        &["delayP95", "jitterP95", "packetsLostPct"],
    ),
    ("accedian-flowmeter", "flowmeter", &["throughputAvg"]),
];

impl IngestionProfile {
    pub fn default_for(tenant: TenantId) -> Self {
        let mut metrics = MetricSelection::new();
        for (vendor, object_type, names) in DEFAULT_INGESTED_METRICS {
            let by_type = metrics.entry(vendor.to_string()).or_default();
            let enabled = by_type.entry(object_type.to_string()).or_default();
            for name in *names {
                enabled.insert(name.to_string(), true);
            }
        }
        Self {
            meta: ResourceMeta::new(ResourceKind::IngestionProfile, tenant),
            metrics,
        }
    }
}

impl_document!(IngestionProfile, ResourceKind::IngestionProfile);

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Scheduled SLA report. Schedule fields use cron syntax.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportScheduleConfig {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub name: String,
    pub report_type: String,
    pub active: bool,
    pub time_range_duration: String,
    pub threshold_profile: Ref<ThresholdProfile>,
    pub meta_filters: BTreeMap<String, Vec<String>>,
    /// ISO-8601 duration.
    pub granularity: String,
    /// Milliseconds.
    pub timeout: u32,
    pub timezone: String,
    pub minute: String,
    pub hour: String,
    pub day_month: String,
    pub month: String,
    pub day_week: String,
}

impl ReportScheduleConfig {
    pub fn new(
        tenant: TenantId,
        name: impl Into<String>,
        threshold_profile: Ref<ThresholdProfile>,
    ) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::ReportScheduleConfig, tenant),
            name: name.into(),
            active: true,
            threshold_profile,
            time_range_duration: "P1D".into(),
            granularity: "PT1H".into(),
            minute: "0".into(),
            hour: "0".into(),
            day_month: "*".into(),
            month: "*".into(),
            day_week: "*".into(),
            ..Default::default()
        }
    }
}

impl_document!(ReportScheduleConfig, ResourceKind::ReportScheduleConfig);
