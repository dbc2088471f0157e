//! Common fixtures for reconcile tests
//!
//! Builds a small catalog, seeds PlatformAdmins into an [`InMemoryCluster`]
//! and wires a reconciler around it.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use k8s_openapi::api::apps::v1::DeploymentSpec;
use k8s_openapi::api::core::v1::{ConfigMap, PodTemplateSpec, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use platform_admin_controller::cluster::{ClusterApi, InMemoryCluster};
use platform_admin_controller::config::{
    Component, ComponentCatalog, ControllerConfig, VersionCatalog,
};
use platform_admin_controller::controller::reconciler::{
    reconcile_platform_admin, ReconcileOutcome, Reconciler, ReconcilerError,
};
use platform_admin_controller::crd::{PlatformAdmin, PlatformAdminSpec, YurtAppSet};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NAMESPACE: &str = "edge";
pub const VERSION: &str = "minnesota";

pub fn config_map(name: &str, key: &str, value: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([(key.to_string(), value.to_string())])),
        ..ConfigMap::default()
    }
}

pub fn service_spec(port: i32) -> ServiceSpec {
    ServiceSpec {
        ports: Some(vec![ServicePort {
            port,
            ..ServicePort::default()
        }]),
        ..ServiceSpec::default()
    }
}

pub fn deployment_spec(image_label: &str) -> DeploymentSpec {
    DeploymentSpec {
        selector: LabelSelector {
            match_labels: Some(BTreeMap::from([(
                "image".to_string(),
                image_label.to_string(),
            )])),
            match_expressions: None,
        },
        template: PodTemplateSpec::default(),
        ..DeploymentSpec::default()
    }
}

/// Component with both a service and a workload
pub fn component(name: &str, port: i32) -> Component {
    Component {
        name: name.to_string(),
        config_maps: Vec::new(),
        service: Some(service_spec(port)),
        deployment: Some(deployment_spec(name)),
    }
}

/// Catalog with one version in each security mode
pub fn catalog() -> ComponentCatalog {
    let no_security = VersionCatalog {
        config_maps: vec![config_map("common-variables", "SECURITY", "false")],
        components: vec![component("core-data", 59880), component("core-metadata", 59881)],
    };
    let security = VersionCatalog {
        config_maps: vec![config_map("common-security", "SECURITY", "true")],
        components: vec![
            component("core-data", 59880),
            component("core-metadata", 59881),
            component("security-proxy", 8443),
        ],
    };
    ComponentCatalog {
        security: BTreeMap::from([(VERSION.to_string(), security)]),
        no_security: BTreeMap::from([(VERSION.to_string(), no_security)]),
    }
}

pub fn reconciler(cluster: &InMemoryCluster, catalog: ComponentCatalog) -> Reconciler<InMemoryCluster> {
    Reconciler::new(
        cluster.clone(),
        Arc::new(catalog),
        Arc::new(ControllerConfig::default()),
    )
}

pub fn platform_admin(name: &str, pool: &str, security: bool) -> PlatformAdmin {
    let mut pa = PlatformAdmin::new(
        name,
        PlatformAdminSpec {
            version: VERSION.to_string(),
            pool_name: pool.to_string(),
            security,
        },
    );
    pa.metadata.namespace = Some(NAMESPACE.to_string());
    pa
}

pub async fn seed(cluster: &InMemoryCluster, pa: &PlatformAdmin) -> PlatformAdmin {
    cluster.create(NAMESPACE, pa).await.unwrap()
}

pub async fn reconcile(
    ctx: &Reconciler<InMemoryCluster>,
    name: &str,
) -> Result<ReconcileOutcome, ReconcilerError> {
    reconcile_platform_admin(ctx, NAMESPACE, name).await
}

pub async fn fetch(cluster: &InMemoryCluster, name: &str) -> Option<PlatformAdmin> {
    cluster.get::<PlatformAdmin>(NAMESPACE, name).await.unwrap()
}

pub async fn workload_set(cluster: &InMemoryCluster, name: &str) -> Option<YurtAppSet> {
    cluster.get::<YurtAppSet>(NAMESPACE, name).await.unwrap()
}

pub fn pool_names(yas: &YurtAppSet) -> Vec<String> {
    yas.spec.topology.pools.iter().map(|p| p.name.clone()).collect()
}

/// Report every listed pool of a workload-set as fully rolled out
pub async fn mark_pools_ready(cluster: &InMemoryCluster, name: &str) {
    let yas = workload_set(cluster, name).await.unwrap();
    let pool_replicas: serde_json::Map<String, serde_json::Value> = yas
        .spec
        .topology
        .pools
        .iter()
        .map(|p| (p.name.clone(), json!(1)))
        .collect();
    let count = pool_replicas.len();
    cluster
        .set_status::<YurtAppSet>(
            NAMESPACE,
            name,
            json!({
                "replicas": count,
                "readyReplicas": count,
                "poolReplicas": pool_replicas,
            }),
        )
        .await
        .unwrap();
}

pub fn owner_uids(meta: &ObjectMeta) -> Vec<String> {
    meta.owner_references
        .iter()
        .flatten()
        .map(|r| r.uid.clone())
        .collect()
}
