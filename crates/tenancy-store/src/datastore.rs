//! One handle over every collection the provisioning core touches.

use std::sync::Arc;

use tenancy_types::{
    Branding, Card, ConnectorConfig, ConnectorInstance, Dashboard, DataCleaningProfile, Document,
    IngestionProfile, Locale, MetadataConfig, MetricBaselineHour, ReportScheduleConfig, Tenant,
    TenantMetadata, ThresholdProfile,
};

use crate::baseline::BaselineStore;
use crate::memory::InMemoryCollection;
use crate::traits::Collection;

/// Typed access to the collection holding `T`.
pub trait HasCollection<T: Document> {
    fn collection(&self) -> Arc<dyn Collection<T>>;

    /// Swap the backend for `T` (e.g. a fault-injecting wrapper in tests).
    fn replace_collection(&mut self, collection: Arc<dyn Collection<T>>);
}

macro_rules! datastore {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// Every collection of the tenant provisioning datastore.
        ///
        /// Cloning is cheap: each collection is shared behind an `Arc`.
        #[derive(Clone)]
        pub struct Datastore {
            $($field: Arc<dyn Collection<$ty>>,)*
        }

        impl Datastore {
            /// A datastore whose collections all live in process memory.
            pub fn in_memory() -> Self {
                Self {
                    $($field: Arc::new(InMemoryCollection::<$ty>::new()),)*
                }
            }

            $(
                pub fn $field(&self) -> Arc<dyn Collection<$ty>> {
                    Arc::clone(&self.$field)
                }
            )*
        }

        $(
            impl HasCollection<$ty> for Datastore {
                fn collection(&self) -> Arc<dyn Collection<$ty>> {
                    Arc::clone(&self.$field)
                }

                fn replace_collection(&mut self, collection: Arc<dyn Collection<$ty>>) {
                    self.$field = collection;
                }
            }
        )*
    };
}

datastore! {
    tenants: Tenant,
    tenant_metadata: TenantMetadata,
    branding: Branding,
    cards: Card,
    dashboards: Dashboard,
    locales: Locale,
    connector_configs: ConnectorConfig,
    connector_instances: ConnectorInstance,
    metadata_configs: MetadataConfig,
    metric_baselines: MetricBaselineHour,
    report_schedules: ReportScheduleConfig,
    threshold_profiles: ThresholdProfile,
    data_cleaning_profiles: DataCleaningProfile,
    ingestion_profiles: IngestionProfile,
}

impl Datastore {
    /// Replace the collection for `T`, builder style.
    pub fn with_collection<T: Document>(mut self, collection: Arc<dyn Collection<T>>) -> Self
    where
        Self: HasCollection<T>,
    {
        self.replace_collection(collection);
        self
    }

    /// Per-hour baseline operations over the baseline collection.
    pub fn baselines(&self) -> BaselineStore {
        BaselineStore::new(self.metric_baselines())
    }
}

impl Default for Datastore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore").finish_non_exhaustive()
    }
}
