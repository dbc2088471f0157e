//! # Deletion
//!
//! A PlatformAdmin being deleted first withdraws its pool from every
//! workload-set it joined, then drops its finalizer. Objects it owns alone
//! are removed by owner-reference cascade; shared workload-sets survive with
//! the other pools intact.
//!
//! The finalizer stays until every pool entry is gone, so a failed pass is
//! retried by the error policy. No status is written on this path.

use super::pool::leave_pool;
use super::resolve::resolve;
use super::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::cluster::patch::{diff, is_empty_patch};
use crate::cluster::{ClusterApi, ClusterError};
use crate::constants::PLATFORM_ADMIN_FINALIZER;
use crate::crd::{PlatformAdmin, YurtAppSet};
use crate::observability::metrics;
use kube::ResourceExt;
use serde_json::json;
use tracing::{debug, info};

/// Finalize a PlatformAdmin carrying a deletion timestamp
pub async fn finalize<C: ClusterApi>(
    ctx: &Reconciler<C>,
    platform_admin: &PlatformAdmin,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let namespace = platform_admin.namespace().unwrap_or_default();
    let name = platform_admin.name_any();

    if !platform_admin
        .finalizers()
        .iter()
        .any(|f| f == PLATFORM_ADMIN_FINALIZER)
    {
        debug!(resource.namespace = %namespace, resource.name = %name, "No finalizer, nothing to clean up");
        return Ok(ReconcileOutcome::Done);
    }

    let desired = resolve(&ctx.catalog, platform_admin).map_err(|source| ReconcilerError::Resolve {
        namespace: namespace.clone(),
        name: name.clone(),
        source,
    })?;

    let pool_name = platform_admin.spec.pool_name.as_str();
    for component in desired.components.iter().filter(|c| c.deployment.is_some()) {
        leave_workload_set(&ctx.cluster, &namespace, &component.name, pool_name)
            .await
            .map_err(|source| ReconcilerError::ReleasePool {
                namespace: namespace.clone(),
                component: component.name.clone(),
                source,
            })?;
    }

    remove_finalizer(&ctx.cluster, platform_admin)
        .await
        .map_err(|source| ReconcilerError::Finalizer {
            namespace: namespace.clone(),
            name: name.clone(),
            source,
        })?;

    metrics::forget_platform_admin(&namespace, &name);
    info!(resource.namespace = %namespace, resource.name = %name, "PlatformAdmin finalized");
    Ok(ReconcileOutcome::Done)
}

/// Remove our pool from one workload-set; a missing workload-set is fine
async fn leave_workload_set<C: ClusterApi>(
    cluster: &C,
    namespace: &str,
    component: &str,
    pool_name: &str,
) -> Result<(), ClusterError> {
    let Some(yas) = cluster.get::<YurtAppSet>(namespace, component).await? else {
        return Ok(());
    };
    let mut updated = yas.clone();
    if !leave_pool(&mut updated.spec.topology.pools, pool_name) {
        return Ok(());
    }
    let patch = diff(&yas, &updated, yas.metadata.resource_version.as_deref())?;
    if !is_empty_patch(&patch) {
        cluster.patch::<YurtAppSet>(namespace, component, &patch).await?;
        info!(resource.namespace = %namespace, component = %component, pool = %pool_name, "Left YurtAppSet");
    }
    Ok(())
}

async fn remove_finalizer<C: ClusterApi>(
    cluster: &C,
    platform_admin: &PlatformAdmin,
) -> Result<(), ClusterError> {
    let remaining: Vec<&String> = platform_admin
        .finalizers()
        .iter()
        .filter(|f| *f != PLATFORM_ADMIN_FINALIZER)
        .collect();
    let patch = json!({
        "metadata": {
            "finalizers": remaining,
            "resourceVersion": platform_admin.resource_version(),
        }
    });
    cluster
        .patch::<PlatformAdmin>(
            &platform_admin.namespace().unwrap_or_default(),
            &platform_admin.name_any(),
            &patch,
        )
        .await?;
    Ok(())
}
