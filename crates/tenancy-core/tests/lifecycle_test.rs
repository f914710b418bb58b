//! End-to-end lifecycle tests against the in-memory datastore.

use std::sync::Arc;
use std::time::Duration;

use tenancy_core::roles::{ALL_ROLES, SKYLIGHT_ADMIN, SKYLIGHT_ADMIN_ONLY, TENANT_ADMIN};
use tenancy_core::{
    CoreConfig, Datastore, Document, ErrorKind, ProvisionStep, RoleHeader, TenancyService, TenantId,
};
use tenancy_store::{Collection, FaultyCollection, Operation};
use tenancy_types::{
    Dashboard, DataCleaningProfile, HourOfWeek, IngestionProfile, MetadataConfig,
    MetricBaselineData, MetricBaselineHour, Ref, ReportScheduleConfig, Tenant, TenantMetadata, ThresholdProfile,
    DEFAULT_THRESHOLD_PROFILE_NAME,
};

fn operator() -> RoleHeader {
    RoleHeader::single(SKYLIGHT_ADMIN)
}

fn tenant_admin() -> RoleHeader {
    RoleHeader::single(TENANT_ADMIN)
}

/// Helper: provision tenant "Acme" and return the service and its owner key.
async fn setup() -> (TenancyService, TenantId) {
    setup_on(Datastore::in_memory()).await
}

async fn setup_on(store: Datastore) -> (TenancyService, TenantId) {
    let svc = TenancyService::new(store, &CoreConfig::default());
    let report = svc
        .provision_tenant(SKYLIGHT_ADMIN_ONLY, &operator(), Tenant::new("Acme", "acme"))
        .await
        .unwrap();
    assert!(report.is_complete());
    let tenant = report.into_result().unwrap();
    (svc, tenant.owner_id())
}

async fn default_profile(svc: &TenancyService, tenant: &TenantId) -> ThresholdProfile {
    let mut profiles = svc
        .list::<ThresholdProfile>(ALL_ROLES, &tenant_admin(), tenant)
        .await
        .unwrap();
    assert_eq!(profiles.len(), 1);
    profiles.remove(0)
}

#[tokio::test]
async fn provisioning_creates_one_of_each_default() {
    let (svc, tenant) = setup().await;
    let admin = tenant_admin();

    let ingestion = svc.list::<IngestionProfile>(ALL_ROLES, &admin, &tenant).await.unwrap();
    let metadata_cfg = svc.list::<MetadataConfig>(ALL_ROLES, &admin, &tenant).await.unwrap();
    let cleaning = svc.list::<DataCleaningProfile>(ALL_ROLES, &admin, &tenant).await.unwrap();
    let meta = svc.list::<TenantMetadata>(ALL_ROLES, &admin, &tenant).await.unwrap();
    let profile = default_profile(&svc, &tenant).await;

    assert_eq!(ingestion.len(), 1);
    assert_eq!(metadata_cfg.len(), 1);
    assert_eq!(cleaning.len(), 1);
    assert_eq!(meta.len(), 1);
    assert_eq!(profile.name, DEFAULT_THRESHOLD_PROFILE_NAME);

    for owner in [
        ingestion[0].tenant_id(),
        metadata_cfg[0].tenant_id(),
        cleaning[0].tenant_id(),
        meta[0].tenant_id(),
        profile.tenant_id(),
    ] {
        assert_eq!(owner, &tenant);
    }
    assert!(meta[0].default_threshold_profile.points_to(profile.id()));
}

#[tokio::test]
async fn threshold_profile_delete_waits_for_every_referrer() {
    let (svc, tenant) = setup().await;
    let admin = tenant_admin();
    let profile = default_profile(&svc, &tenant).await;

    // Create dashboard D referencing the default profile.
    let dashboard = svc
        .create(ALL_ROLES, &admin, Dashboard::new(tenant.clone(), "ops", Ref::new(profile.id())))
        .await
        .unwrap();
    let schedule = svc
        .create(
            ALL_ROLES,
            &admin,
            ReportScheduleConfig::new(tenant.clone(), "weekly", Ref::new(profile.id())),
        )
        .await
        .unwrap();

    // Both referrers block.
    let err = svc
        .delete::<ThresholdProfile>(ALL_ROLES, &admin, &tenant, profile.id())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityViolation);

    // Dashboard gone, schedule still blocks.
    svc.delete::<Dashboard>(ALL_ROLES, &admin, &tenant, dashboard.id())
        .await
        .unwrap();
    let err = svc
        .delete::<ThresholdProfile>(ALL_ROLES, &admin, &tenant, profile.id())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
    assert!(err.to_string().contains(schedule.id()));

    // Nothing references it any more.
    svc.delete::<ReportScheduleConfig>(ALL_ROLES, &admin, &tenant, schedule.id())
        .await
        .unwrap();
    let removed = svc
        .delete::<ThresholdProfile>(ALL_ROLES, &admin, &tenant, profile.id())
        .await
        .unwrap();
    assert_eq!(removed, profile);

    let err = svc
        .get::<ThresholdProfile>(ALL_ROLES, &admin, &tenant, profile.id())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn revisions_strictly_advance_and_stale_writes_fail() {
    let (svc, tenant) = setup().await;
    let admin = tenant_admin();
    let profile = default_profile(&svc, &tenant).await;

    let mut last = profile.rev().generation().unwrap();
    for name in ["a", "b", "c"] {
        let body = format!(r#"{{"name":"{name}"}}"#);
        let updated: ThresholdProfile = svc
            .patch(ALL_ROLES, &admin, &tenant, profile.id(), body.as_bytes())
            .await
            .unwrap();
        let generation = updated.rev().generation().unwrap();
        assert!(generation > last);
        last = generation;
    }

    let stale = format!(r#"{{"_rev":"{}","name":"lost"}}"#, profile.rev());
    let err = svc
        .patch::<ThresholdProfile>(ALL_ROLES, &admin, &tenant, profile.id(), stale.as_bytes())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let stored: ThresholdProfile = svc
        .get(ALL_ROLES, &admin, &tenant, profile.id())
        .await
        .unwrap();
    assert_eq!(stored.name, "c");
}

#[tokio::test]
async fn tenant_names_are_unique_ignoring_case() {
    let (svc, _) = setup().await;
    let report = svc
        .provision_tenant(SKYLIGHT_ADMIN_ONLY, &operator(), Tenant::new("aCME", "other"))
        .await
        .unwrap();
    assert_eq!(report.failed_step, Some(ProvisionStep::Tenant));
    assert_eq!(report.error.unwrap().kind(), ErrorKind::Conflict);

    let tenants = svc.list_tenants(SKYLIGHT_ADMIN_ONLY, &operator()).await.unwrap();
    assert_eq!(tenants.len(), 1);
}

#[tokio::test]
async fn partial_provisioning_is_reported_and_left_in_place() {
    let base = Datastore::in_memory();
    let faulty: Arc<dyn Collection<DataCleaningProfile>> = Arc::new(
        FaultyCollection::new(base.data_cleaning_profiles())
            .failing(Operation::Create, "status 503 - service unavailable"),
    );
    let store = base.with_collection(faulty);
    let svc = TenancyService::new(store.clone(), &CoreConfig::default());

    let report = svc
        .provision_tenant(SKYLIGHT_ADMIN_ONLY, &operator(), Tenant::new("Acme", "acme"))
        .await
        .unwrap();
    assert_eq!(report.failed_step, Some(ProvisionStep::DataCleaningProfile));
    assert_eq!(report.completed_steps.len(), 4);
    assert!(!report.compensated);

    let owner = report.tenant.as_ref().unwrap().owner_id();
    assert_eq!(store.threshold_profiles().list_all(&owner).await.unwrap().len(), 1);
    assert!(store.tenant_metadata().list_all(&owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn compensation_mode_rolls_back_a_failed_provisioning() {
    let base = Datastore::in_memory();
    let faulty: Arc<dyn Collection<DataCleaningProfile>> = Arc::new(
        FaultyCollection::new(base.data_cleaning_profiles())
            .failing(Operation::Create, "status 503 - service unavailable"),
    );
    let store = base.with_collection(faulty);
    let mut config = CoreConfig::default();
    config.provision.compensate_on_failure = true;
    let svc = TenancyService::new(store.clone(), &config);

    let report = svc
        .provision_tenant(SKYLIGHT_ADMIN_ONLY, &operator(), Tenant::new("Acme", "acme"))
        .await
        .unwrap();
    assert!(report.compensated);
    assert!(store.tenants().list_all(&TenantId::global()).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_baseline_writers_on_different_hours_both_land() {
    let (svc, tenant) = setup().await;
    let svc = Arc::new(svc);

    let writers: Vec<_> = (0..8u32)
        .map(|h| {
            let svc = Arc::clone(&svc);
            let tenant = tenant.clone();
            tokio::spawn(async move {
                let entry = MetricBaselineData {
                    metric: "delayP95".into(),
                    hour_of_week: HourOfWeek::new(h).unwrap(),
                    average: f64::from(h),
                    ..Default::default()
                };
                svc.update_baseline_hour(ALL_ROLES, &tenant_admin(), &tenant, "mo-1", h, &[entry])
                    .await
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    // The bus path lands on the same hour documents.
    let message = format!(
        r#"{{"tenantId":"{tenant}","monitoredObjectId":"mo-1","baselines":[{{"metric":"jitterP95","hourOfWeek":3,"average":0.5}}]}}"#
    );
    assert!(svc
        .baseline_consumer()
        .handle_incoming_baseline(message.as_bytes())
        .await);

    let view = svc
        .get_baseline(ALL_ROLES, &tenant_admin(), &tenant, "mo-1")
        .await
        .unwrap();
    assert_eq!(view.hours.len(), 8);
    assert_eq!(view.hours[&HourOfWeek::new(3).unwrap()].len(), 2);
}

fn delay_entry(metric: &str, hour: u32) -> MetricBaselineData {
    MetricBaselineData {
        metric: metric.into(),
        hour_of_week: HourOfWeek::new(hour).unwrap(),
        average: 1.0,
        ..Default::default()
    }
}

#[tokio::test]
async fn racing_writers_on_one_baseline_hour_get_one_success_and_one_conflict() {
    let base = Datastore::in_memory();
    let slow: Arc<dyn Collection<MetricBaselineHour>> = Arc::new(
        FaultyCollection::new(base.metric_baselines()).delayed(Duration::from_millis(50)),
    );
    let (svc, tenant) = setup_on(base.with_collection(slow)).await;
    let admin = tenant_admin();

    svc.update_baseline_hour(ALL_ROLES, &admin, &tenant, "mo-1", 7, &[delay_entry("delayP95", 7)])
        .await
        .unwrap();

    // Both writers read the same revision before either write lands.
    let first_entries = [delay_entry("jitterP95", 7)];
    let second_entries = [delay_entry("packetLoss", 7)];
    let (first, second) = tokio::join!(
        svc.update_baseline_hour(ALL_ROLES, &admin, &tenant, "mo-1", 7, &first_entries),
        svc.update_baseline_hour(ALL_ROLES, &admin, &tenant, "mo-1", 7, &second_entries),
    );
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    let loser = outcomes.iter().find_map(|o| o.as_ref().err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::Conflict);

    let stored = svc
        .get_baseline_hour(ALL_ROLES, &admin, &tenant, "mo-1", 7)
        .await
        .unwrap();
    assert_eq!(stored.baselines.len(), 2);
    assert_eq!(stored.rev().generation().unwrap(), 2);
}

#[tokio::test]
async fn racing_patches_without_a_revision_get_one_success_and_one_conflict() {
    let base = Datastore::in_memory();
    let slow: Arc<dyn Collection<ThresholdProfile>> = Arc::new(
        FaultyCollection::new(base.threshold_profiles()).delayed(Duration::from_millis(50)),
    );
    let (svc, tenant) = setup_on(base.with_collection(slow)).await;
    let admin = tenant_admin();
    let profile = default_profile(&svc, &tenant).await;

    let (first, second) = tokio::join!(
        svc.patch::<ThresholdProfile>(ALL_ROLES, &admin, &tenant, profile.id(), br#"{"name":"left"}"#),
        svc.patch::<ThresholdProfile>(ALL_ROLES, &admin, &tenant, profile.id(), br#"{"name":"right"}"#),
    );
    let winner = match (&first, &second) {
        (Ok(doc), Err(e)) | (Err(e), Ok(doc)) => {
            assert_eq!(e.kind(), ErrorKind::Conflict);
            doc.name.clone()
        }
        _ => panic!("expected exactly one patch to win: {first:?} / {second:?}"),
    };

    let stored: ThresholdProfile = svc
        .get(ALL_ROLES, &admin, &tenant, profile.id())
        .await
        .unwrap();
    assert_eq!(stored.name, winner);
}
