use std::fmt;

use serde::{Deserialize, Serialize};

/// How many instances of a kind a single tenant may own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// At most one per tenant; a second create is a conflict.
    SingletonPerTenant,
    /// Any number per tenant.
    Many,
}

/// Discriminator for every document the provisioning service stores.
///
/// The `datatype` string is written into each document and doubles as the
/// storage-ID prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Tenant,
    TenantMetadata,
    Branding,
    Card,
    Dashboard,
    Locale,
    ConnectorConfig,
    ConnectorInstance,
    MetadataConfig,
    MetricBaseline,
    ReportScheduleConfig,
    ThresholdProfile,
    DataCleaningProfile,
    IngestionProfile,
}

impl ResourceKind {
    /// All kinds, in declaration order.
    pub const ALL: [ResourceKind; 14] = [
        Self::Tenant,
        Self::TenantMetadata,
        Self::Branding,
        Self::Card,
        Self::Dashboard,
        Self::Locale,
        Self::ConnectorConfig,
        Self::ConnectorInstance,
        Self::MetadataConfig,
        Self::MetricBaseline,
        Self::ReportScheduleConfig,
        Self::ThresholdProfile,
        Self::DataCleaningProfile,
        Self::IngestionProfile,
    ];

    /// The `datatype` discriminator written into stored documents.
    pub fn datatype(&self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::TenantMetadata => "tenantMetadata",
            Self::Branding => "branding",
            Self::Card => "card",
            Self::Dashboard => "dashboard",
            Self::Locale => "locale",
            Self::ConnectorConfig => "connectorConfig",
            Self::ConnectorInstance => "connectorInstance",
            Self::MetadataConfig => "metadataConfig",
            Self::MetricBaseline => "metricBaseline",
            Self::ReportScheduleConfig => "reportScheduleConfig",
            Self::ThresholdProfile => "thresholdProfile",
            Self::DataCleaningProfile => "dataCleaningProfile",
            Self::IngestionProfile => "ingestionProfile",
        }
    }

    /// Human-readable name used in error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Tenant => "Tenant",
            Self::TenantMetadata => "Tenant Metadata",
            Self::Branding => "Tenant Branding",
            Self::Card => "Tenant Card",
            Self::Dashboard => "Tenant Dashboard",
            Self::Locale => "Tenant Locale",
            Self::ConnectorConfig => "Tenant Connector Configuration",
            Self::ConnectorInstance => "Tenant Connector Instance",
            Self::MetadataConfig => "Tenant Metadata Configuration",
            Self::MetricBaseline => "Metric Baseline",
            Self::ReportScheduleConfig => "Report Schedule Configuration",
            Self::ThresholdProfile => "Tenant Threshold Profile",
            Self::DataCleaningProfile => "Data Cleaning Profile",
            Self::IngestionProfile => "Tenant Ingestion Profile",
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::IngestionProfile | Self::MetadataConfig | Self::TenantMetadata => {
                Cardinality::SingletonPerTenant
            }
            _ => Cardinality::Many,
        }
    }

    /// Returns `true` if documents of this kind are owned by a tenant.
    pub fn is_tenant_scoped(&self) -> bool {
        !matches!(self, Self::Tenant)
    }

    /// Look up a kind by its `datatype` discriminator.
    pub fn from_datatype(datatype: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.datatype() == datatype)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.datatype())
    }
}
