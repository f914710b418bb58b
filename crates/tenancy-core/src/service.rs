//! Gated resource operations.
//!
//! Every operation follows the same order: authorize, then (for writes)
//! parse and validate, then fetch fresh, then patch or guard, then write,
//! then classify the store error. A denied caller never reaches the
//! datastore.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tenancy_gate::{AuthorizationGate, RoleGate, RoleHeader};
use tenancy_store::{Datastore, HasCollection};
use tenancy_types::{
    BaselineUpdate, BulkBaselineEntry, BulkOperationResult, Document, HourOfWeek, MetricBaseline,
    MetricBaselineData, MetricBaselineHour, ResourceKind, Tenant, TenantId,
};
use tracing::info;

use crate::baseline::{require_target, BaselineConsumer, BaselineService};
use crate::bulk::{BulkTicket, BulkUpdateManager};
use crate::config::{BaselineConfig, CoreConfig};
use crate::deadline::within;
use crate::error::{CoreError, CoreResult};
use crate::fetch::{create_limited_fetch_manager, LimitedFetchManager};
use crate::guard::IntegrityGuard;
use crate::patch::{apply_patch, MergePatch};
use crate::provision::{ProvisionReport, Provisioner};

/// The provisioning core behind an outer surface (HTTP, CLI, bus).
pub struct TenancyService {
    store: Datastore,
    gate: Arc<dyn AuthorizationGate>,
    guard: IntegrityGuard,
    provisioner: Provisioner,
    fetch: LimitedFetchManager,
    baselines: BaselineService,
    bulk_config: BaselineConfig,
    bulk: OnceLock<BulkUpdateManager>,
    call_timeout: Duration,
}

impl TenancyService {
    /// A service using the role gate described by `config.gate`.
    pub fn new(store: Datastore, config: &CoreConfig) -> Self {
        Self::with_gate(store, Arc::new(RoleGate::new(config.gate.clone())), config)
    }

    pub fn with_gate(store: Datastore, gate: Arc<dyn AuthorizationGate>, config: &CoreConfig) -> Self {
        let call_timeout = config.store.timeout();
        Self {
            guard: IntegrityGuard::for_datastore(&store, call_timeout),
            provisioner: Provisioner::new(store.clone(), config.provision.clone(), call_timeout),
            fetch: create_limited_fetch_manager(&store, &config.fetch).with_call_timeout(call_timeout),
            baselines: BaselineService::new(store.baselines(), call_timeout)
                .with_batch_size(config.baselines.batch_size),
            bulk_config: config.baselines.clone(),
            bulk: OnceLock::new(),
            store,
            gate,
            call_timeout,
        }
    }

    pub fn store(&self) -> &Datastore {
        &self.store
    }

    pub fn guard_mut(&mut self) -> &mut IntegrityGuard {
        &mut self.guard
    }

    fn authorize(
        &self,
        action: &str,
        kind: ResourceKind,
        allowed: &[&str],
        caller: &RoleHeader,
    ) -> CoreResult<()> {
        let operation = format!("{action} {}", kind.display_name());
        self.gate.authorize(&operation, allowed, caller)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Generic resource operations
    // -----------------------------------------------------------------------

    /// Store a new document. The store assigns the revision (and the ID when
    /// none is given).
    pub async fn create<T: Document>(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        doc: T,
    ) -> CoreResult<T>
    where
        Datastore: HasCollection<T>,
    {
        let kind = T::KIND;
        self.authorize("Create", kind, allowed, caller)?;

        if kind == ResourceKind::Tenant {
            return Err(CoreError::BadRequest(
                "tenants are created through provisioning".into(),
            ));
        }
        if !doc.rev().is_empty() {
            return Err(CoreError::BadRequest(format!(
                "a new {} must not carry a revision",
                kind.display_name()
            )));
        }
        if kind.is_tenant_scoped() && doc.tenant_id().is_empty() {
            return Err(CoreError::BadRequest(format!(
                "{} requires a tenantId",
                kind.display_name()
            )));
        }

        let collection = HasCollection::<T>::collection(&self.store);
        let created = within(self.call_timeout, kind, "create", collection.create(doc)).await?;
        info!(kind = %kind, tenant_id = %created.tenant_id(), id = %created.id(), "resource created");
        Ok(created)
    }

    pub async fn get<T: Document>(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        tenant: &TenantId,
        id: &str,
    ) -> CoreResult<T>
    where
        Datastore: HasCollection<T>,
    {
        self.authorize("Get", T::KIND, allowed, caller)?;
        self.fetch_fresh(tenant, id).await
    }

    /// All documents of `T` for `tenant`. An empty result is NotFound.
    pub async fn list<T: Document>(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        tenant: &TenantId,
    ) -> CoreResult<Vec<T>>
    where
        Datastore: HasCollection<T>,
    {
        let kind = T::KIND;
        self.authorize("Get all", kind, allowed, caller)?;
        let collection = HasCollection::<T>::collection(&self.store);
        let docs = within(self.call_timeout, kind, "list", collection.list_all(tenant)).await?;
        if docs.is_empty() {
            return Err(CoreError::NotFound(format!(
                "no {} found for tenant {tenant}",
                kind.display_name()
            )));
        }
        Ok(docs)
    }

    /// Merge-patch one document.
    ///
    /// The body is parsed before anything is read. The compare token is the
    /// body's `_rev` when present, otherwise the revision just fetched.
    pub async fn patch<T: Document>(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        tenant: &TenantId,
        id: &str,
        body: &[u8],
    ) -> CoreResult<T>
    where
        Datastore: HasCollection<T>,
    {
        let kind = T::KIND;
        self.authorize("Update", kind, allowed, caller)?;
        let patch = MergePatch::parse(body)?;

        let current: T = self.fetch_fresh(tenant, id).await?;
        let expected = patch.stated_rev().unwrap_or_else(|| current.rev().clone());
        let merged = apply_patch(&current, &patch)?;

        let collection = HasCollection::<T>::collection(&self.store);
        let stored = within(
            self.call_timeout,
            kind,
            "update",
            collection.update(merged, &expected),
        )
        .await?;
        info!(kind = %kind, tenant_id = %tenant, id, rev = %stored.rev(), "resource updated");
        Ok(stored)
    }

    /// Delete one document once nothing references it. Returns the
    /// document as it was before the delete.
    pub async fn delete<T: Document>(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        tenant: &TenantId,
        id: &str,
    ) -> CoreResult<T>
    where
        Datastore: HasCollection<T>,
    {
        let kind = T::KIND;
        self.authorize("Delete", kind, allowed, caller)?;
        let _: T = self.fetch_fresh(tenant, id).await?;
        self.guard.check_deletable(kind, tenant, id).await?;

        let collection = HasCollection::<T>::collection(&self.store);
        let removed = within(self.call_timeout, kind, "delete", collection.delete(tenant, id)).await?;
        info!(kind = %kind, tenant_id = %tenant, id, "resource deleted");
        Ok(removed)
    }

    async fn fetch_fresh<T: Document>(&self, tenant: &TenantId, id: &str) -> CoreResult<T>
    where
        Datastore: HasCollection<T>,
    {
        let collection = HasCollection::<T>::collection(&self.store);
        within(self.call_timeout, T::KIND, "get", collection.get(tenant, id)).await
    }

    // -----------------------------------------------------------------------
    // Tenants
    // -----------------------------------------------------------------------

    /// Create a tenant and its default resources.
    ///
    /// Only an authorization failure is returned as `Err`; every other
    /// outcome, including a failed step, is described by the report.
    pub async fn provision_tenant(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        request: Tenant,
    ) -> CoreResult<ProvisionReport> {
        self.authorize("Create", ResourceKind::Tenant, allowed, caller)?;
        Ok(self.provisioner.provision(request).await)
    }

    pub async fn get_tenant(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        id: &str,
    ) -> CoreResult<Tenant> {
        self.get(allowed, caller, &TenantId::global(), id).await
    }

    pub async fn list_tenants(&self, allowed: &[&str], caller: &RoleHeader) -> CoreResult<Vec<Tenant>> {
        self.list(allowed, caller, &TenantId::global()).await
    }

    pub async fn patch_tenant(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        id: &str,
        body: &[u8],
    ) -> CoreResult<Tenant> {
        self.patch(allowed, caller, &TenantId::global(), id, body).await
    }

    /// Delete the tenant record only. Resources owned by the tenant stay.
    pub async fn delete_tenant(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        id: &str,
    ) -> CoreResult<Tenant> {
        self.delete(allowed, caller, &TenantId::global(), id).await
    }

    // -----------------------------------------------------------------------
    // Metric baselines
    // -----------------------------------------------------------------------

    /// One stored hour, through the bounded fetch manager.
    pub async fn get_baseline_hour(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        tenant: &TenantId,
        monitored_object_id: &str,
        hour: u32,
    ) -> CoreResult<MetricBaselineHour> {
        self.authorize("Get", ResourceKind::MetricBaseline, allowed, caller)?;
        let hour = HourOfWeek::new(hour)?;
        Ok(self.fetch.fetch(tenant, monitored_object_id, hour).await?)
    }

    pub async fn get_baseline(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        tenant: &TenantId,
        monitored_object_id: &str,
    ) -> CoreResult<MetricBaseline> {
        self.authorize("Get", ResourceKind::MetricBaseline, allowed, caller)?;
        self.baselines.get_baseline(tenant, monitored_object_id).await
    }

    pub async fn update_baseline_hour(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        tenant: &TenantId,
        monitored_object_id: &str,
        hour: u32,
        entries: &[MetricBaselineData],
    ) -> CoreResult<MetricBaselineHour> {
        self.authorize("Update", ResourceKind::MetricBaseline, allowed, caller)?;
        let hour = HourOfWeek::new(hour)?;
        self.baselines
            .update_hour(tenant, monitored_object_id, hour, entries)
            .await
    }

    /// Apply a [`BaselineUpdate`] body hour by hour.
    ///
    /// Stops at the first failed hour; hours applied before it stay
    /// applied. Returns the assembled baseline on success.
    pub async fn patch_baseline(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        body: &[u8],
    ) -> CoreResult<MetricBaseline> {
        self.authorize("Update", ResourceKind::MetricBaseline, allowed, caller)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(CoreError::BadRequest("baseline body is empty".into()));
        }
        let update: BaselineUpdate = serde_json::from_slice(body)
            .map_err(|e| CoreError::BadRequest(format!("invalid baseline update: {e}")))?;
        require_target(&update.tenant_id, &update.monitored_object_id)?;

        for (hour, entries) in update.by_hour() {
            self.baselines
                .update_hour(&update.tenant_id, &update.monitored_object_id, hour, &entries)
                .await?;
        }
        self.baselines
            .get_baseline(&update.tenant_id, &update.monitored_object_id)
            .await
    }

    /// The requested hours of several monitored objects, fetched through
    /// the bounded fetch manager. See [`LimitedFetchManager::fetch_many`].
    pub async fn get_baselines_for(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        tenant: &TenantId,
        requested: &BTreeMap<String, Vec<u32>>,
        add_not_found: bool,
    ) -> CoreResult<Vec<MetricBaselineHour>> {
        self.authorize("Get", ResourceKind::MetricBaseline, allowed, caller)?;
        let mut hours = BTreeMap::new();
        for (monitored_object_id, requested_hours) in requested {
            let parsed = requested_hours
                .iter()
                .map(|h| HourOfWeek::new(*h))
                .collect::<Result<Vec<_>, _>>()?;
            hours.insert(monitored_object_id.clone(), parsed);
        }
        Ok(self.fetch.fetch_many(tenant, &hours, add_not_found).await?)
    }

    /// Write a bulk request now and return one result per item.
    pub async fn bulk_update_baselines(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        tenant: &TenantId,
        entries: &[BulkBaselineEntry],
    ) -> CoreResult<Vec<BulkOperationResult>> {
        self.authorize("Bulk update", ResourceKind::MetricBaseline, allowed, caller)?;
        self.baselines.bulk_update(tenant, entries).await
    }

    /// Queue a bulk request on the background workers, starting them on
    /// first use.
    pub async fn submit_bulk_baselines(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        tenant: TenantId,
        entries: Vec<BulkBaselineEntry>,
    ) -> CoreResult<BulkTicket> {
        self.authorize("Bulk update", ResourceKind::MetricBaseline, allowed, caller)?;
        let manager = self
            .bulk
            .get_or_init(|| BulkUpdateManager::start(self.baselines.clone(), &self.bulk_config));
        manager.submit(tenant, entries).await
    }

    pub async fn delete_baseline(
        &self,
        allowed: &[&str],
        caller: &RoleHeader,
        tenant: &TenantId,
        monitored_object_id: &str,
    ) -> CoreResult<MetricBaseline> {
        self.authorize("Delete", ResourceKind::MetricBaseline, allowed, caller)?;
        self.baselines
            .delete_baseline(tenant, monitored_object_id)
            .await
    }

    /// A bus consumer writing through the same per-hour path as
    /// [`Self::patch_baseline`].
    pub fn baseline_consumer(&self) -> BaselineConsumer {
        BaselineConsumer::new(Arc::new(self.baselines.clone()))
    }
}

impl std::fmt::Debug for TenancyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenancyService")
            .field("guard", &self.guard)
            .field("fetch", &self.fetch)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tenancy_gate::roles::{
        ALL_ROLES, SKYLIGHT_ADMIN, SKYLIGHT_ADMIN_ONLY, SKYLIGHT_AND_TENANT_ADMIN, TENANT_ADMIN,
        TENANT_USER,
    };
    use tenancy_store::{Collection, FaultyCollection, Operation};
    use tenancy_types::{Card, IngestionProfile, Ref, Rev, ThresholdProfile};

    fn admin() -> RoleHeader {
        RoleHeader::single(TENANT_ADMIN)
    }

    fn service() -> TenancyService {
        TenancyService::new(Datastore::in_memory(), &CoreConfig::default())
    }

    /// Service plus the ID of a provisioned tenant.
    async fn provisioned() -> (TenancyService, TenantId) {
        let svc = service();
        let tenant = svc
            .provision_tenant(SKYLIGHT_ADMIN_ONLY, &RoleHeader::single(SKYLIGHT_ADMIN), Tenant::new("Acme", "acme"))
            .await
            .unwrap()
            .into_result()
            .unwrap();
        (svc, tenant.owner_id())
    }

    /// Collection wrapper counting every call, to prove denied requests
    /// never reach the store.
    struct Tally<T: Document> {
        inner: Arc<dyn Collection<T>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl<T: Document> Collection<T> for Tally<T> {
        async fn create(&self, doc: T) -> tenancy_store::StoreResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.create(doc).await
        }
        async fn get(&self, scope: &TenantId, id: &str) -> tenancy_store::StoreResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get(scope, id).await
        }
        async fn update(&self, doc: T, expected: &Rev) -> tenancy_store::StoreResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.update(doc, expected).await
        }
        async fn delete(&self, scope: &TenantId, id: &str) -> tenancy_store::StoreResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(scope, id).await
        }
        async fn list_all(&self, scope: &TenantId) -> tenancy_store::StoreResult<Vec<T>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_all(scope).await
        }
    }

    // -----------------------------------------------------------------------
    // Authorization
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn denied_caller_never_reaches_the_store() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = Datastore::in_memory();
        let tally: Arc<dyn Collection<Card>> = Arc::new(Tally {
            inner: base.cards(),
            calls: calls.clone(),
        });
        let svc = TenancyService::new(base.with_collection(tally), &CoreConfig::default());
        let tenant = TenantId::new("t-1");
        let user = RoleHeader::single(TENANT_USER);

        let err = svc
            .create(SKYLIGHT_AND_TENANT_ADMIN, &user, Card::new(tenant.clone(), "c"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let err = svc
            .patch::<Card>(SKYLIGHT_AND_TENANT_ADMIN, &user, &tenant, "c", b"not json")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let err = svc
            .delete::<Card>(SKYLIGHT_AND_TENANT_ADMIN, &user, &tenant, "c")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn denied_provisioning_writes_nothing() {
        let svc = service();
        let err = svc
            .provision_tenant(SKYLIGHT_ADMIN_ONLY, &admin(), Tenant::new("Acme", "acme"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(svc
            .store()
            .tenants()
            .list_all(&TenantId::global())
            .await
            .unwrap()
            .is_empty());
    }

    // -----------------------------------------------------------------------
    // Create / list
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_rejects_preset_revision_and_missing_tenant() {
        let svc = service();
        let mut card = Card::new(TenantId::new("t-1"), "c");
        card.meta.rev = Rev::new("1-a");
        let err = svc.create(ALL_ROLES, &admin(), card).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        let err = svc
            .create(ALL_ROLES, &admin(), Card::new(TenantId::global(), "c"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn second_ingestion_profile_conflicts() {
        let (svc, tenant) = provisioned().await;
        let before = svc
            .list::<IngestionProfile>(ALL_ROLES, &admin(), &tenant)
            .await
            .unwrap();

        let err = svc
            .create(ALL_ROLES, &admin(), IngestionProfile::default_for(tenant.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let after = svc
            .list::<IngestionProfile>(ALL_ROLES, &admin(), &tenant)
            .await
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn empty_list_is_not_found() {
        let svc = service();
        let err = svc
            .list::<Card>(ALL_ROLES, &admin(), &TenantId::new("nobody"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.kind().status_hint(), 404);
    }

    // -----------------------------------------------------------------------
    // Patch
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn patch_merges_and_keeps_tenant() {
        let (svc, tenant) = provisioned().await;
        let profile = svc
            .create(ALL_ROLES, &admin(), ThresholdProfile::named(tenant.clone(), "gold"))
            .await
            .unwrap();

        let patched: ThresholdProfile = svc
            .patch(
                ALL_ROLES,
                &admin(),
                &tenant,
                profile.id(),
                br#"{"name":"platinum","tenantId":"someone-else"}"#,
            )
            .await
            .unwrap();
        assert_eq!(patched.name, "platinum");
        assert_eq!(patched.tenant_id(), &tenant);
        assert_ne!(patched.rev(), profile.rev());
    }

    #[tokio::test]
    async fn stale_revision_in_body_conflicts_without_mutation() {
        let (svc, tenant) = provisioned().await;
        let profile = svc
            .create(ALL_ROLES, &admin(), ThresholdProfile::named(tenant.clone(), "gold"))
            .await
            .unwrap();
        let stale = profile.rev().to_string();

        let _: ThresholdProfile = svc
            .patch(ALL_ROLES, &admin(), &tenant, profile.id(), br#"{"name":"first"}"#)
            .await
            .unwrap();

        let body = format!(r#"{{"_rev":"{stale}","name":"second"}}"#);
        let err = svc
            .patch::<ThresholdProfile>(ALL_ROLES, &admin(), &tenant, profile.id(), body.as_bytes())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let stored: ThresholdProfile = svc.get(ALL_ROLES, &admin(), &tenant, profile.id()).await.unwrap();
        assert_eq!(stored.name, "first");
    }

    #[tokio::test]
    async fn numeric_revision_in_body_is_rejected_without_mutation() {
        let (svc, tenant) = provisioned().await;
        let profile = svc
            .create(ALL_ROLES, &admin(), ThresholdProfile::named(tenant.clone(), "gold"))
            .await
            .unwrap();

        let err = svc
            .patch::<ThresholdProfile>(ALL_ROLES, &admin(), &tenant, profile.id(), br#"{"_rev":5,"name":"x"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        let stored: ThresholdProfile = svc.get(ALL_ROLES, &admin(), &tenant, profile.id()).await.unwrap();
        assert_eq!(stored.name, "gold");
        assert_eq!(stored.rev(), profile.rev());
    }

    #[tokio::test]
    async fn bad_body_is_rejected_before_the_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let base = Datastore::in_memory();
        let tally: Arc<dyn Collection<Card>> = Arc::new(Tally {
            inner: base.cards(),
            calls: calls.clone(),
        });
        let svc = TenancyService::new(base.with_collection(tally), &CoreConfig::default());

        let err = svc
            .patch::<Card>(ALL_ROLES, &admin(), &TenantId::new("t"), "missing", b"")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn patch_of_missing_document_is_not_found() {
        let svc = service();
        let err = svc
            .patch::<Card>(ALL_ROLES, &admin(), &TenantId::new("t"), "missing", b"{}")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn referenced_card_cannot_be_deleted() {
        let (svc, tenant) = provisioned().await;
        let card = svc
            .create(ALL_ROLES, &admin(), Card::new(tenant.clone(), "latency"))
            .await
            .unwrap();
        let mut dash = tenancy_types::Dashboard::new(tenant.clone(), "ops", Ref::default());
        dash.cards.push(Ref::new(card.id()));
        svc.create(ALL_ROLES, &admin(), dash).await.unwrap();

        let err = svc
            .delete::<Card>(ALL_ROLES, &admin(), &tenant, card.id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
        assert_eq!(err.kind().status_hint(), 422);
    }

    #[tokio::test]
    async fn deleting_a_tenant_leaves_its_resources() {
        let (svc, tenant) = provisioned().await;
        let removed = svc
            .delete_tenant(SKYLIGHT_ADMIN_ONLY, &RoleHeader::single(SKYLIGHT_ADMIN), tenant.as_str())
            .await
            .unwrap();
        assert_eq!(removed.name, "Acme");

        let profiles = svc
            .list::<ThresholdProfile>(ALL_ROLES, &admin(), &tenant)
            .await
            .unwrap();
        assert_eq!(profiles.len(), 1);
    }

    #[tokio::test]
    async fn store_timeout_is_internal() {
        let base = Datastore::in_memory();
        let slow: Arc<dyn Collection<Card>> = Arc::new(
            FaultyCollection::new(base.cards()).delayed(Duration::from_millis(200)),
        );
        let mut config = CoreConfig::default();
        config.store.timeout_ms = 10;
        let svc = TenancyService::new(base.with_collection(slow), &config);

        let err = svc
            .get::<Card>(ALL_ROLES, &admin(), &TenantId::new("t"), "c")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn classified_backend_message_surfaces_as_conflict() {
        let base = Datastore::in_memory();
        let faulty: Arc<dyn Collection<Card>> = Arc::new(
            FaultyCollection::new(base.cards()).failing(Operation::Create, "Document update conflict: status 409 - conflict"),
        );
        let svc = TenancyService::new(base.with_collection(faulty), &CoreConfig::default());
        let err = svc
            .create(ALL_ROLES, &admin(), Card::new(TenantId::new("t"), "c"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    // -----------------------------------------------------------------------
    // Baselines
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn baseline_patch_and_fetch_share_the_hour_path() {
        let svc = service();
        let tenant = TenantId::new("t-1");
        let body = br#"{
            "tenantId": "t-1",
            "monitoredObjectId": "mo-1",
            "baselines": [
                {"metric": "delayP95", "direction": "0", "hourOfWeek": 12, "average": 2.0},
                {"metric": "delayP95", "direction": "0", "hourOfWeek": 13, "average": 3.0}
            ]
        }"#;
        let view = svc.patch_baseline(ALL_ROLES, &admin(), body).await.unwrap();
        assert_eq!(view.hours.len(), 2);

        let consumer = svc.baseline_consumer();
        let msg = br#"{"tenantId":"t-1","monitoredObjectId":"mo-1","baselines":[{"metric":"jitterP95","hourOfWeek":12,"average":1.0}]}"#;
        assert!(consumer.handle_incoming_baseline(msg).await);

        let hour = svc
            .get_baseline_hour(ALL_ROLES, &admin(), &tenant, "mo-1", 12)
            .await
            .unwrap();
        assert_eq!(hour.baselines.len(), 2);
        assert_eq!(hour.rev().generation().unwrap(), 2);
    }

    #[tokio::test]
    async fn out_of_range_hour_is_bad_request() {
        let svc = service();
        let err = svc
            .get_baseline_hour(ALL_ROLES, &admin(), &TenantId::new("t"), "mo", 168)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn baseline_body_without_keys_is_bad_request() {
        let svc = service();
        let err = svc
            .patch_baseline(ALL_ROLES, &admin(), br#"{"baselines":[]}"#)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    fn bulk_item(mo: &str, hour: u32, metric: &str) -> BulkBaselineEntry {
        let hour = HourOfWeek::new(hour).unwrap();
        BulkBaselineEntry {
            monitored_object_id: mo.into(),
            hour_of_week: hour,
            baselines: vec![MetricBaselineData {
                metric: metric.into(),
                hour_of_week: hour,
                average: 2.0,
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn multi_object_lookup_returns_requested_hours_in_order() {
        let svc = service();
        let tenant = TenantId::new("t-1");
        for (mo, hour) in [("mo-b", 4), ("mo-a", 9), ("mo-a", 2)] {
            let item = bulk_item(mo, hour, "delayP95");
            svc.update_baseline_hour(ALL_ROLES, &admin(), &tenant, mo, hour, &item.baselines)
                .await
                .unwrap();
        }

        let requested = BTreeMap::from([
            ("mo-a".to_string(), vec![9, 2, 2]),
            ("mo-b".to_string(), vec![4, 5]),
        ]);
        let found = svc
            .get_baselines_for(ALL_ROLES, &admin(), &tenant, &requested, false)
            .await
            .unwrap();
        let keys: Vec<_> = found
            .iter()
            .map(|h| (h.monitored_object_id.as_str(), h.hour_of_week.get()))
            .collect();
        assert_eq!(keys, vec![("mo-a", 2), ("mo-a", 9), ("mo-b", 4)]);

        let padded = svc
            .get_baselines_for(ALL_ROLES, &admin(), &tenant, &requested, true)
            .await
            .unwrap();
        assert_eq!(padded.len(), 4);
        assert!(padded.iter().any(|h| h.hour_of_week.get() == 5 && h.baselines.is_empty()));
    }

    #[tokio::test]
    async fn multi_object_lookup_rejects_bad_hours() {
        let svc = service();
        let requested = BTreeMap::from([("mo-a".to_string(), vec![1, 200])]);
        let err = svc
            .get_baselines_for(ALL_ROLES, &admin(), &TenantId::new("t-1"), &requested, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn bulk_update_reports_failed_items_alongside_applied_ones() {
        let svc = service();
        let tenant = TenantId::new("t-1");
        let results = svc
            .bulk_update_baselines(
                ALL_ROLES,
                &admin(),
                &tenant,
                &[bulk_item("mo-1", 3, "delayP95"), bulk_item(" ", 3, "delayP95")],
            )
            .await
            .unwrap();
        assert!(results[0].ok);
        assert!(!results[1].ok);
        assert_eq!(results[1].error, "bad-request");

        let hour = svc
            .get_baseline_hour(ALL_ROLES, &admin(), &tenant, "mo-1", 3)
            .await
            .unwrap();
        assert_eq!(results[0].rev, hour.rev().as_str());
    }

    #[tokio::test]
    async fn bulk_update_is_gated() {
        let svc = service();
        let err = svc
            .bulk_update_baselines(
                SKYLIGHT_AND_TENANT_ADMIN,
                &RoleHeader::single(TENANT_USER),
                &TenantId::new("t-1"),
                &[bulk_item("mo-1", 3, "delayP95")],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = svc
            .submit_bulk_baselines(
                SKYLIGHT_AND_TENANT_ADMIN,
                &RoleHeader::single(TENANT_USER),
                TenantId::new("t-1"),
                vec![bulk_item("mo-1", 3, "delayP95")],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn submitted_bulk_request_lands_through_the_workers() {
        let svc = service();
        let tenant = TenantId::new("t-1");
        let ticket = svc
            .submit_bulk_baselines(
                ALL_ROLES,
                &admin(),
                tenant.clone(),
                vec![bulk_item("mo-1", 0, "delayP95"), bulk_item("mo-1", 1, "jitterP95")],
            )
            .await
            .unwrap();
        let results = ticket.outcome().await.unwrap();
        assert!(results.iter().all(|r| r.ok));

        let view = svc.get_baseline(ALL_ROLES, &admin(), &tenant, "mo-1").await.unwrap();
        assert_eq!(view.hours.len(), 2);
    }

    #[tokio::test]
    async fn bulk_batch_size_comes_from_config() {
        let mut config = CoreConfig::default();
        config.baselines.batch_size = 1;
        let svc = TenancyService::new(Datastore::in_memory(), &config);
        let err = svc
            .bulk_update_baselines(
                ALL_ROLES,
                &admin(),
                &TenantId::new("t-1"),
                &[bulk_item("mo-1", 0, "delayP95"), bulk_item("mo-2", 0, "delayP95")],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.to_string().contains("limit is 1"));
    }
}
