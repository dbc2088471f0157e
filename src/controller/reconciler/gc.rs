//! # Garbage Collection
//!
//! Children labelled as generated by this controller but no longer desired
//! are released: our owner reference is dropped, and the object is deleted
//! once no owner is left. Objects owned only by other PlatformAdmins are
//! never touched.
//!
//! Collection is best effort. Failures are logged and counted but never fail
//! the pass; the next pass retries them.

use super::ownership::{is_orphan, is_owned_by, release, ChildKind};
use super::pool::leave_pool;
use crate::cluster::{ClusterApi, ClusterError, ManagedObject};
use crate::crd::YurtAppSet;
use crate::observability::metrics;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::{Resource, ResourceExt};
use std::collections::HashSet;
use tracing::{info, warn};

/// What happened to one stale child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collected {
    Released,
    Deleted,
}

impl Collected {
    fn action(self) -> &'static str {
        match self {
            Collected::Released => "released",
            Collected::Deleted => "deleted",
        }
    }
}

/// Release every stale child of `kind` owned by `owner_uid`.
///
/// `detach` is applied to a child that stays alive after release, to undo
/// any in-object membership the PlatformAdmin added.
async fn collect<C, K, F>(
    cluster: &C,
    namespace: &str,
    owner_uid: &str,
    kind: ChildKind,
    desired: &HashSet<String>,
    detach: F,
) where
    C: ClusterApi,
    K: ManagedObject,
    F: Fn(&mut K),
{
    let children = match cluster.list::<K>(namespace, &kind.selector()).await {
        Ok(children) => children,
        Err(e) => {
            warn!(
                resource.namespace = %namespace,
                kind = kind.kind(),
                error = %e,
                "Failed to list children for garbage collection"
            );
            metrics::increment_gc_failures(kind.kind());
            return;
        }
    };

    for child in children {
        let name = child.name_any();
        if desired.contains(&name) || !is_owned_by(child.meta(), owner_uid) {
            continue;
        }
        match collect_one(cluster, namespace, owner_uid, child, &detach).await {
            Ok(outcome) => {
                info!(
                    resource.namespace = %namespace,
                    kind = kind.kind(),
                    child = %name,
                    action = outcome.action(),
                    "Collected stale child"
                );
                metrics::increment_gc_collected(kind.kind(), outcome.action());
            }
            Err(e) => {
                warn!(
                    resource.namespace = %namespace,
                    kind = kind.kind(),
                    child = %name,
                    error = %e,
                    "Failed to collect stale child"
                );
                metrics::increment_gc_failures(kind.kind());
            }
        }
    }
}

async fn collect_one<C, K, F>(
    cluster: &C,
    namespace: &str,
    owner_uid: &str,
    mut child: K,
    detach: &F,
) -> Result<Collected, ClusterError>
where
    C: ClusterApi,
    K: ManagedObject,
    F: Fn(&mut K),
{
    release(child.meta_mut(), owner_uid);
    if is_orphan(child.meta()) {
        cluster.delete::<K>(namespace, &child.name_any()).await?;
        return Ok(Collected::Deleted);
    }
    detach(&mut child);
    cluster.replace(namespace, &child).await?;
    Ok(Collected::Released)
}

/// Release config objects not in `desired`
pub async fn collect_config_maps<C: ClusterApi>(
    cluster: &C,
    namespace: &str,
    owner_uid: &str,
    desired: &HashSet<String>,
) {
    collect::<C, ConfigMap, _>(
        cluster,
        namespace,
        owner_uid,
        ChildKind::ConfigMap,
        desired,
        |_| {},
    )
    .await;
}

/// Release services not in `desired`
pub async fn collect_services<C: ClusterApi>(
    cluster: &C,
    namespace: &str,
    owner_uid: &str,
    desired: &HashSet<String>,
) {
    collect::<C, Service, _>(
        cluster,
        namespace,
        owner_uid,
        ChildKind::Service,
        desired,
        |_| {},
    )
    .await;
}

/// Release workload-sets not in `desired`; shared ones also lose our pool
pub async fn collect_workload_sets<C: ClusterApi>(
    cluster: &C,
    namespace: &str,
    owner_uid: &str,
    pool_name: &str,
    desired: &HashSet<String>,
) {
    collect::<C, YurtAppSet, _>(
        cluster,
        namespace,
        owner_uid,
        ChildKind::WorkloadSet,
        desired,
        |yas: &mut YurtAppSet| {
            leave_pool(&mut yas.spec.topology.pools, pool_name);
        },
    )
    .await;
}
