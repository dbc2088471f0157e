//! # Child Synchronization
//!
//! Upserts the children of one PlatformAdmin and reports component readiness.
//!
//! Every write is conditional: an object is only sent back when the merged
//! result differs from what was read, so a converged pass performs no writes.
//! The first failed write aborts the pass.

use super::ownership::{claim, owner_reference, ChildKind};
use super::pool::{join_pool, new_workload_set};
use crate::cluster::patch::{diff, is_empty_patch};
use crate::cluster::{ClusterApi, ClusterError};
use crate::config::Component;
use crate::constants::{ANNOTATION_SERVICE_TOPOLOGY_KEY, ANNOTATION_SERVICE_TOPOLOGY_VALUE_NODE_POOL};
use crate::crd::{PlatformAdmin, YurtAppSet};
use k8s_openapi::api::apps::v1::DeploymentSpec;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Ready/total component counts of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentReadiness {
    pub ready: i32,
    pub total: i32,
}

impl ComponentReadiness {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            ready: 0,
            total: i32::try_from(total).unwrap_or(i32::MAX),
        }
    }

    #[must_use]
    pub fn unready(&self) -> i32 {
        self.total - self.ready
    }

    #[must_use]
    pub fn all_ready(&self) -> bool {
        self.ready == self.total
    }
}

fn parent_owner(platform_admin: &PlatformAdmin, controller: bool) -> Result<OwnerReference, ClusterError> {
    owner_reference(platform_admin, controller).ok_or_else(|| ClusterError::Invalid {
        kind: "PlatformAdmin".to_string(),
        namespace: platform_admin.namespace().unwrap_or_default(),
        name: platform_admin.name_any(),
        message: "metadata.uid is not set".to_string(),
    })
}

fn merge_map(target: &mut Option<BTreeMap<String, String>>, extra: Option<&BTreeMap<String, String>>) {
    if let Some(extra) = extra.filter(|e| !e.is_empty()) {
        let map = target.get_or_insert_with(BTreeMap::new);
        for (k, v) in extra {
            map.insert(k.clone(), v.clone());
        }
    }
}

/// Upsert every desired config object
pub async fn sync_config_maps<C: ClusterApi>(
    cluster: &C,
    platform_admin: &PlatformAdmin,
    config_maps: &[ConfigMap],
) -> Result<(), ClusterError> {
    for config_map in config_maps {
        upsert_config_map(cluster, platform_admin, config_map).await?;
    }
    Ok(())
}

/// Create or update one config object, adding us as a non-controller owner
pub async fn upsert_config_map<C: ClusterApi>(
    cluster: &C,
    platform_admin: &PlatformAdmin,
    desired: &ConfigMap,
) -> Result<(), ClusterError> {
    let namespace = platform_admin.namespace().unwrap_or_default();
    let name = desired.name_any();
    let owner = parent_owner(platform_admin, false)?;

    let Some(existing) = cluster.get::<ConfigMap>(&namespace, &name).await? else {
        let mut fresh = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(namespace.clone()),
                labels: desired.metadata.labels.clone(),
                annotations: desired.metadata.annotations.clone(),
                ..ObjectMeta::default()
            },
            data: desired.data.clone(),
            binary_data: desired.binary_data.clone(),
            immutable: desired.immutable,
        };
        claim(&mut fresh.metadata, ChildKind::ConfigMap, owner);
        cluster.create(&namespace, &fresh).await?;
        info!(resource.namespace = %namespace, configmap = %name, "Created ConfigMap");
        return Ok(());
    };

    let mut updated = existing.clone();
    updated.data.clone_from(&desired.data);
    updated.binary_data.clone_from(&desired.binary_data);
    merge_map(&mut updated.metadata.labels, desired.metadata.labels.as_ref());
    merge_map(&mut updated.metadata.annotations, desired.metadata.annotations.as_ref());
    claim(&mut updated.metadata, ChildKind::ConfigMap, owner);

    if updated != existing {
        // immutable config objects cannot change data; the server reports that
        cluster.replace(&namespace, &updated).await?;
        info!(resource.namespace = %namespace, configmap = %name, "Updated ConfigMap");
    } else {
        debug!(resource.namespace = %namespace, configmap = %name, "ConfigMap up to date");
    }
    Ok(())
}

/// Keep every field the desired spec leaves unset at its live value.
///
/// The server defaults more than it echoes back (cluster IPs, node ports,
/// traffic policies, health-check ports), so only fields the desired spec sets
/// are compared. Ports are matched on `port` and `name`; desired ports replace
/// the live list.
fn preserve_server_defaults(
    desired: &mut ServiceSpec,
    live: &ServiceSpec,
) -> Result<(), serde_json::Error> {
    let mut wanted = serde_json::to_value(&*desired)?;
    let current = serde_json::to_value(live)?;
    fill_unset(&mut wanted, &current);

    let live_ports = current.get("ports").and_then(Value::as_array);
    let ports = wanted.get_mut("ports").and_then(Value::as_array_mut);
    if let (Some(ports), Some(live_ports)) = (ports, live_ports) {
        for port in ports {
            if let Some(live_port) = live_ports.iter().find(|p| same_port(p, port)) {
                fill_unset(port, live_port);
            }
        }
    }
    *desired = serde_json::from_value(wanted)?;
    Ok(())
}

/// Copy keys missing from `wanted` out of `live`, recursing into nested objects
fn fill_unset(wanted: &mut Value, live: &Value) {
    let (Value::Object(wanted), Value::Object(live)) = (wanted, live) else {
        return;
    };
    for (key, live_value) in live {
        if wanted.get(key).is_none_or(Value::is_null) {
            wanted.insert(key.clone(), live_value.clone());
        } else if let Some(value) = wanted.get_mut(key) {
            fill_unset(value, live_value);
        }
    }
}

fn same_port(a: &Value, b: &Value) -> bool {
    a.get("port") == b.get("port") && a.get("name") == b.get("name")
}

/// Create or update the Service of a component
pub async fn upsert_service<C: ClusterApi>(
    cluster: &C,
    platform_admin: &PlatformAdmin,
    component_name: &str,
    spec: &ServiceSpec,
) -> Result<(), ClusterError> {
    let namespace = platform_admin.namespace().unwrap_or_default();
    let owner = parent_owner(platform_admin, false)?;
    let topology = BTreeMap::from([(
        ANNOTATION_SERVICE_TOPOLOGY_KEY.to_string(),
        ANNOTATION_SERVICE_TOPOLOGY_VALUE_NODE_POOL.to_string(),
    )]);

    let Some(existing) = cluster.get::<Service>(&namespace, component_name).await? else {
        let mut fresh = Service {
            metadata: ObjectMeta {
                name: Some(component_name.to_string()),
                namespace: Some(namespace.clone()),
                annotations: Some(topology),
                ..ObjectMeta::default()
            },
            spec: Some(spec.clone()),
            status: None,
        };
        claim(&mut fresh.metadata, ChildKind::Service, owner);
        cluster.create(&namespace, &fresh).await?;
        info!(resource.namespace = %namespace, component = %component_name, "Created Service");
        return Ok(());
    };

    let mut updated = existing.clone();
    let mut desired_spec = spec.clone();
    if let Some(live) = existing.spec.as_ref() {
        preserve_server_defaults(&mut desired_spec, live)?;
    }
    updated.spec = Some(desired_spec);
    merge_map(&mut updated.metadata.annotations, Some(&topology));
    claim(&mut updated.metadata, ChildKind::Service, owner);

    if updated != existing {
        cluster.replace(&namespace, &updated).await?;
        info!(resource.namespace = %namespace, component = %component_name, "Updated Service");
    }
    Ok(())
}

/// Make sure our pool is a member of the component's workload-set.
///
/// Returns whether our pool is ready. A pool that was just created or joined
/// is never ready within the same pass.
pub async fn sync_workload_set<C: ClusterApi>(
    cluster: &C,
    platform_admin: &PlatformAdmin,
    component: &Component,
    deployment: &DeploymentSpec,
) -> Result<bool, ClusterError> {
    let namespace = platform_admin.namespace().unwrap_or_default();
    let pool_name = platform_admin.spec.pool_name.as_str();

    let Some(existing) = cluster.get::<YurtAppSet>(&namespace, &component.name).await? else {
        let mut fresh = new_workload_set(platform_admin, component, deployment);
        claim(
            &mut fresh.metadata,
            ChildKind::WorkloadSet,
            parent_owner(platform_admin, true)?,
        );
        cluster.create(&namespace, &fresh).await?;
        info!(
            resource.namespace = %namespace,
            component = %component.name,
            pool = %pool_name,
            "Created YurtAppSet"
        );
        return Ok(false);
    };

    let member = existing.pool_index(pool_name).is_some();
    let ready = member && existing.is_pool_ready(pool_name);

    let mut updated = existing.clone();
    let joined = join_pool(&mut updated.spec.topology.pools, pool_name);
    claim(
        &mut updated.metadata,
        ChildKind::WorkloadSet,
        parent_owner(platform_admin, false)?,
    );

    let patch = diff(&existing, &updated, existing.metadata.resource_version.as_deref())?;
    if !is_empty_patch(&patch) {
        cluster
            .patch::<YurtAppSet>(&namespace, &component.name, &patch)
            .await?;
        if joined {
            info!(
                resource.namespace = %namespace,
                component = %component.name,
                pool = %pool_name,
                "Joined YurtAppSet"
            );
        }
    }
    Ok(ready)
}

/// Synchronize every component in order, counting ready ones into `readiness`.
///
/// The count reflects the components processed before an error.
pub async fn sync_components<C: ClusterApi>(
    cluster: &C,
    platform_admin: &PlatformAdmin,
    components: &[Component],
    readiness: &mut ComponentReadiness,
) -> Result<(), ClusterError> {
    for component in components {
        if let Some(spec) = component.service.as_ref() {
            upsert_service(cluster, platform_admin, &component.name, spec).await?;
        }
        let workload_ready = match component.deployment.as_ref() {
            Some(deployment) => {
                sync_workload_set(cluster, platform_admin, component, deployment).await?
            }
            None => true,
        };
        if workload_ready {
            readiness.ready += 1;
        } else {
            debug!(component = %component.name, "Component not ready yet");
        }
    }
    Ok(())
}
