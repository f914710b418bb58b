//! Cascading tenant provisioning.
//!
//! Creating a tenant writes six documents in a fixed order:
//!
//! 1. the [`Tenant`] itself (names are unique, case-insensitively)
//! 2. the default [`IngestionProfile`]
//! 3. an empty [`MetadataConfig`]
//! 4. the `"Default"` [`ThresholdProfile`]
//! 5. an empty [`DataCleaningProfile`]
//! 6. [`TenantMetadata`] pointing at the profile from step 4
//!
//! Each step runs only after the previous one succeeded. The first failure
//! stops the sequence; whatever was already written stays written unless
//! [`ProvisionConfig::compensate_on_failure`] is set, in which case the
//! completed steps are deleted again in reverse order.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tenancy_store::{Datastore, HasCollection};
use tenancy_types::{
    DataCleaningProfile, Document, IngestionProfile, MetadataConfig, Ref, ResourceKind, Tenant,
    TenantId, TenantMetadata, ThresholdProfile,
};
use tracing::{error, info, warn};

use crate::config::ProvisionConfig;
use crate::deadline::within;
use crate::error::{CoreError, CoreResult};

/// One step of the provisioning sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionStep {
    Tenant,
    IngestionProfile,
    MetadataConfig,
    ThresholdProfile,
    DataCleaningProfile,
    TenantMetadata,
}

impl ProvisionStep {
    /// All steps in execution order.
    pub const ORDER: [ProvisionStep; 6] = [
        Self::Tenant,
        Self::IngestionProfile,
        Self::MetadataConfig,
        Self::ThresholdProfile,
        Self::DataCleaningProfile,
        Self::TenantMetadata,
    ];

    /// The kind of document this step writes.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Tenant => ResourceKind::Tenant,
            Self::IngestionProfile => ResourceKind::IngestionProfile,
            Self::MetadataConfig => ResourceKind::MetadataConfig,
            Self::ThresholdProfile => ResourceKind::ThresholdProfile,
            Self::DataCleaningProfile => ResourceKind::DataCleaningProfile,
            Self::TenantMetadata => ResourceKind::TenantMetadata,
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind().display_name())
    }
}

/// Outcome of one provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    /// The stored tenant, once step 1 succeeded.
    pub tenant: Option<Tenant>,
    /// Steps that completed, in order.
    pub completed_steps: Vec<ProvisionStep>,
    /// IDs written by the completed steps, in order.
    pub created: Vec<(ProvisionStep, String)>,
    pub failed_step: Option<ProvisionStep>,
    /// The failure of `failed_step`, naming the step.
    pub error: Option<CoreError>,
    /// `true` when the completed steps were deleted after the failure.
    pub compensated: bool,
}

impl ProvisionReport {
    fn new() -> Self {
        Self {
            tenant: None,
            completed_steps: Vec::new(),
            created: Vec::new(),
            failed_step: None,
            error: None,
            compensated: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.completed_steps.len() == ProvisionStep::ORDER.len()
    }

    /// The tenant on full success, otherwise the step failure.
    pub fn into_result(self) -> CoreResult<Tenant> {
        match (self.error, self.tenant) {
            (Some(e), _) => Err(e),
            (None, Some(tenant)) => Ok(tenant),
            (None, None) => Err(CoreError::Internal("provisioning produced no tenant".into())),
        }
    }

    fn record(&mut self, step: ProvisionStep, id: &str) {
        self.completed_steps.push(step);
        self.created.push((step, id.to_string()));
    }

    fn fail(mut self, step: ProvisionStep, tenant_name: &str, err: CoreError) -> Self {
        error!(step = %step, tenant = tenant_name, error = %err, "provisioning step failed");
        self.failed_step = Some(step);
        self.error = Some(err.context(format!("unable to create {step} for tenant {tenant_name}")));
        self
    }
}

/// Runs the provisioning sequence against a [`Datastore`].
#[derive(Debug, Clone)]
pub struct Provisioner {
    store: Datastore,
    config: ProvisionConfig,
    call_timeout: Duration,
}

impl Provisioner {
    pub fn new(store: Datastore, config: ProvisionConfig, call_timeout: Duration) -> Self {
        Self {
            store,
            config,
            call_timeout,
        }
    }

    /// Provision `request` and every default resource it needs.
    ///
    /// Never returns early with an error: the report carries the failed
    /// step and its error. A tenant whose name matches an existing tenant
    /// (trimmed, case-insensitive) fails at step 1 with a conflict and
    /// writes nothing.
    pub async fn provision(&self, request: Tenant) -> ProvisionReport {
        let name = request.name.clone();
        let mut report = self.run(request, &name).await;
        if report.error.is_some() && self.config.compensate_on_failure && !report.created.is_empty() {
            self.compensate(&mut report).await;
        }
        if report.is_complete() {
            info!(tenant = %name, steps = report.completed_steps.len(), "tenant provisioned");
        }
        report
    }

    async fn run(&self, request: Tenant, name: &str) -> ProvisionReport {
        let mut report = ProvisionReport::new();

        if let Err(e) = validate(&request) {
            return report.fail(ProvisionStep::Tenant, name, e);
        }

        // Step 1
        let tenant = match self.create_tenant(request).await {
            Ok(t) => t,
            Err(e) => return report.fail(ProvisionStep::Tenant, name, e),
        };
        report.record(ProvisionStep::Tenant, tenant.id());
        report.tenant = Some(tenant.clone());
        let owner = tenant.owner_id();

        // Step 2
        match self.create(IngestionProfile::default_for(owner.clone())).await {
            Ok(doc) => report.record(ProvisionStep::IngestionProfile, doc.id()),
            Err(e) => return report.fail(ProvisionStep::IngestionProfile, name, e),
        }

        // Step 3
        match self.create(MetadataConfig::empty(owner.clone())).await {
            Ok(doc) => report.record(ProvisionStep::MetadataConfig, doc.id()),
            Err(e) => return report.fail(ProvisionStep::MetadataConfig, name, e),
        }

        // Step 4
        let profile = match self.create(ThresholdProfile::default_for(owner.clone())).await {
            Ok(doc) => doc,
            Err(e) => return report.fail(ProvisionStep::ThresholdProfile, name, e),
        };
        report.record(ProvisionStep::ThresholdProfile, profile.id());

        // Step 5
        match self.create(DataCleaningProfile::empty(owner.clone())).await {
            Ok(doc) => report.record(ProvisionStep::DataCleaningProfile, doc.id()),
            Err(e) => return report.fail(ProvisionStep::DataCleaningProfile, name, e),
        }

        // Step 6
        let metadata = TenantMetadata::new(owner, tenant.name.clone(), Ref::new(profile.id()));
        match self.create(metadata).await {
            Ok(doc) => report.record(ProvisionStep::TenantMetadata, doc.id()),
            Err(e) => return report.fail(ProvisionStep::TenantMetadata, name, e),
        }

        report
    }

    async fn create_tenant(&self, request: Tenant) -> CoreResult<Tenant> {
        let existing = within(
            self.call_timeout,
            ResourceKind::Tenant,
            "list",
            self.store.tenants().list_all(&TenantId::global()),
        )
        .await?;
        let folded = request.folded_name();
        if let Some(clash) = existing.iter().find(|t| t.folded_name() == folded) {
            return Err(CoreError::Conflict(format!(
                "tenant with name {} already exists ({})",
                request.name,
                clash.id()
            )));
        }
        within(
            self.call_timeout,
            ResourceKind::Tenant,
            "create",
            self.store.tenants().create(request),
        )
        .await
    }

    async fn create<T: Document>(&self, doc: T) -> CoreResult<T>
    where
        Datastore: HasCollection<T>,
    {
        let collection = HasCollection::<T>::collection(&self.store);
        within(self.call_timeout, T::KIND, "create", collection.create(doc)).await
    }

    async fn compensate(&self, report: &mut ProvisionReport) {
        let Some(tenant) = report.tenant.clone() else {
            return;
        };
        let owner = tenant.owner_id();
        let mut clean = true;
        for (step, id) in report.created.iter().rev() {
            let outcome = match step {
                ProvisionStep::Tenant => self.remove::<Tenant>(&TenantId::global(), id).await,
                ProvisionStep::IngestionProfile => self.remove::<IngestionProfile>(&owner, id).await,
                ProvisionStep::MetadataConfig => self.remove::<MetadataConfig>(&owner, id).await,
                ProvisionStep::ThresholdProfile => self.remove::<ThresholdProfile>(&owner, id).await,
                ProvisionStep::DataCleaningProfile => {
                    self.remove::<DataCleaningProfile>(&owner, id).await
                }
                ProvisionStep::TenantMetadata => self.remove::<TenantMetadata>(&owner, id).await,
            };
            if let Err(e) = outcome {
                clean = false;
                warn!(step = %step, id = %id, error = %e, "compensating delete failed");
            }
        }
        report.compensated = clean;
        info!(tenant = %tenant.name, clean, "provisioning rolled back");
    }

    async fn remove<T: Document>(&self, scope: &TenantId, id: &str) -> CoreResult<()>
    where
        Datastore: HasCollection<T>,
    {
        let collection = HasCollection::<T>::collection(&self.store);
        within(self.call_timeout, T::KIND, "delete", collection.delete(scope, id))
            .await
            .map(|_| ())
    }
}

fn validate(request: &Tenant) -> CoreResult<()> {
    if request.name.trim().is_empty() {
        return Err(CoreError::BadRequest("tenant name is required".into()));
    }
    if !request.meta.rev.is_empty() {
        return Err(CoreError::BadRequest(
            "a new tenant must not carry a revision".into(),
        ));
    }
    Ok(())
}
