//! Deletion handling: pool withdrawal, finalizer release and cascade

mod common;

use common::*;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use platform_admin_controller::cluster::{ClusterApi, InMemoryCluster, Operation};
use platform_admin_controller::constants::PLATFORM_ADMIN_FINALIZER;
use platform_admin_controller::controller::reconciler::{ReconcileOutcome, ReconcilerError};
use platform_admin_controller::crd::{PlatformAdmin, YurtAppSet};

async fn request_deletion(cluster: &InMemoryCluster, name: &str) {
    cluster.delete::<PlatformAdmin>(NAMESPACE, name).await.unwrap();
}

#[tokio::test]
async fn test_deletion_withdraws_pool_and_keeps_others() {
    let cluster = InMemoryCluster::new();
    let ctx = reconciler(&cluster, catalog());
    seed(&cluster, &platform_admin("hangzhou-platform", "hangzhou", false)).await;
    let second = seed(&cluster, &platform_admin("beijing-platform", "beijing", false)).await;
    reconcile(&ctx, "hangzhou-platform").await.unwrap();
    reconcile(&ctx, "beijing-platform").await.unwrap();

    request_deletion(&cluster, "hangzhou-platform").await;
    let pending = fetch(&cluster, "hangzhou-platform").await.unwrap();
    assert!(pending.metadata.deletion_timestamp.is_some());

    assert_eq!(
        reconcile(&ctx, "hangzhou-platform").await.unwrap(),
        ReconcileOutcome::Done
    );

    assert!(fetch(&cluster, "hangzhou-platform").await.is_none());
    let second_uid = second.metadata.uid.unwrap();
    for name in ["core-data", "core-metadata"] {
        let yas = workload_set(&cluster, name).await.unwrap();
        assert_eq!(pool_names(&yas), vec!["beijing"]);
        assert_eq!(owner_uids(&yas.metadata), vec![second_uid.clone()]);
    }
    // shared services and config objects lose only the deleted owner
    let svc = cluster.get::<Service>(NAMESPACE, "core-data").await.unwrap().unwrap();
    assert_eq!(owner_uids(&svc.metadata), vec![second_uid.clone()]);
    let cm = cluster
        .get::<ConfigMap>(NAMESPACE, "common-variables")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner_uids(&cm.metadata), vec![second_uid]);
}

#[tokio::test]
async fn test_sole_owner_deletion_cascades() {
    let cluster = InMemoryCluster::new();
    let ctx = reconciler(&cluster, catalog());
    seed(&cluster, &platform_admin("lonely", "hangzhou", false)).await;
    reconcile(&ctx, "lonely").await.unwrap();
    assert_eq!(cluster.count::<YurtAppSet>(NAMESPACE).await, 2);

    request_deletion(&cluster, "lonely").await;
    reconcile(&ctx, "lonely").await.unwrap();

    assert!(fetch(&cluster, "lonely").await.is_none());
    assert_eq!(cluster.count::<YurtAppSet>(NAMESPACE).await, 0);
    assert_eq!(cluster.count::<Service>(NAMESPACE).await, 0);
    assert_eq!(cluster.count::<ConfigMap>(NAMESPACE).await, 0);
}

#[tokio::test]
async fn test_failed_pool_removal_keeps_finalizer() {
    let cluster = InMemoryCluster::new();
    let ctx = reconciler(&cluster, catalog());
    seed(&cluster, &platform_admin("hangzhou-platform", "hangzhou", false)).await;
    seed(&cluster, &platform_admin("beijing-platform", "beijing", false)).await;
    reconcile(&ctx, "hangzhou-platform").await.unwrap();
    reconcile(&ctx, "beijing-platform").await.unwrap();

    request_deletion(&cluster, "hangzhou-platform").await;
    cluster.fail_next("YurtAppSet", Operation::Patch).await;

    let err = reconcile(&ctx, "hangzhou-platform").await.unwrap_err();
    assert!(matches!(err, ReconcilerError::ReleasePool { .. }));
    let pending = fetch(&cluster, "hangzhou-platform").await.unwrap();
    assert!(pending
        .metadata
        .finalizers
        .unwrap()
        .contains(&PLATFORM_ADMIN_FINALIZER.to_string()));

    // the retry finishes the job
    assert_eq!(
        reconcile(&ctx, "hangzhou-platform").await.unwrap(),
        ReconcileOutcome::Done
    );
    assert!(fetch(&cluster, "hangzhou-platform").await.is_none());
    for name in ["core-data", "core-metadata"] {
        let yas = workload_set(&cluster, name).await.unwrap();
        assert_eq!(pool_names(&yas), vec!["beijing"]);
    }
}

#[tokio::test]
async fn test_missing_workload_set_does_not_block_deletion() {
    let cluster = InMemoryCluster::new();
    let ctx = reconciler(&cluster, catalog());
    seed(&cluster, &platform_admin("partial", "hangzhou", false)).await;
    reconcile(&ctx, "partial").await.unwrap();
    cluster.delete::<YurtAppSet>(NAMESPACE, "core-data").await.unwrap();

    request_deletion(&cluster, "partial").await;
    assert_eq!(reconcile(&ctx, "partial").await.unwrap(), ReconcileOutcome::Done);
    assert!(fetch(&cluster, "partial").await.is_none());
}

#[tokio::test]
async fn test_deletion_writes_no_status() {
    let cluster = InMemoryCluster::new();
    let ctx = reconciler(&cluster, catalog());
    seed(&cluster, &platform_admin("quiet", "hangzhou", false)).await;
    reconcile(&ctx, "quiet").await.unwrap();
    request_deletion(&cluster, "quiet").await;

    // a status write would fail and surface as an error
    cluster
        .fail_times("PlatformAdmin", Operation::PatchStatus, 1)
        .await;
    assert_eq!(reconcile(&ctx, "quiet").await.unwrap(), ReconcileOutcome::Done);
}
