//! # Reconcile Pass
//!
//! One pass over a PlatformAdmin:
//!
//! 1. Fetch the parent (gone means done)
//! 2. Route deleting parents to [`finalize`]
//! 3. Ensure the finalizer and mark the status initialized
//! 4. Resolve the desired state
//! 5. Upsert config objects, then collect stale ones
//! 6. Upsert services and workload-sets, then collect stale ones
//! 7. Aggregate conditions and persist the status
//!
//! The status is persisted on every exit of the normal path, including hard
//! errors. A pass may restart from any intermediate state.

use super::deletion::finalize;
use super::gc::{collect_config_maps, collect_services, collect_workload_sets};
use super::resolve::resolve;
use super::status::{is_ready, persist_status, set_condition};
use super::sync::{sync_components, sync_config_maps, ComponentReadiness};
use super::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::cluster::ClusterApi;
use crate::constants::PLATFORM_ADMIN_FINALIZER;
use crate::crd::{
    Condition, ConditionStatus, PlatformAdmin, PlatformAdminStatus, COMPONENT_AVAILABLE_CONDITION,
    COMPONENT_PROVISIONING_FAILED_REASON, COMPONENT_PROVISIONING_REASON,
    CONFIGMAP_AVAILABLE_CONDITION, CONFIGMAP_PROVISIONING_FAILED_REASON,
};
use crate::observability::metrics;
use kube::ResourceExt;
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Reconcile the PlatformAdmin `namespace/name`
pub async fn reconcile_platform_admin<C: ClusterApi>(
    ctx: &Reconciler<C>,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let span = info_span!("reconcile", resource.namespace = %namespace, resource.name = %name);
    async move {
        metrics::increment_reconciliations();
        let start = Instant::now();
        let result = run_pass(ctx, namespace, name).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => {
                ctx.reset_backoff(&format!("{namespace}/{name}"));
                debug!(?outcome, "Reconcile pass finished");
            }
            Err(e) => {
                metrics::increment_reconciliation_errors();
                warn!(error = %e, conflict = e.is_conflict(), "Reconcile pass failed");
            }
        }
        result
    }
    .instrument(span)
    .await
}

async fn run_pass<C: ClusterApi>(
    ctx: &Reconciler<C>,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let fetched = ctx
        .cluster
        .get::<PlatformAdmin>(namespace, name)
        .await
        .map_err(|source| ReconcilerError::Get {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })?;
    let Some(mut platform_admin) = fetched else {
        debug!("PlatformAdmin not found, nothing to do");
        return Ok(ReconcileOutcome::Done);
    };

    if platform_admin.metadata.deletion_timestamp.is_some() {
        return finalize(ctx, &platform_admin).await;
    }

    let original = platform_admin.status.clone();
    let mut status = original.clone().unwrap_or_default();
    let result = reconcile_normal(ctx, &mut platform_admin, &mut status).await;
    status.ready = is_ready(&status);

    match (
        result,
        persist_status(&ctx.cluster, &platform_admin, original.as_ref(), &status).await,
    ) {
        (Ok(outcome), Ok(())) => Ok(outcome),
        (Ok(_), Err(source)) => Err(ReconcilerError::Status {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        }),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(status_error)) => Err(ReconcilerError::Aggregate {
            original: Box::new(e),
            status: status_error,
        }),
    }
}

async fn ensure_finalizer<C: ClusterApi>(
    ctx: &Reconciler<C>,
    platform_admin: &mut PlatformAdmin,
) -> Result<(), ReconcilerError> {
    if platform_admin
        .finalizers()
        .iter()
        .any(|f| f == PLATFORM_ADMIN_FINALIZER)
    {
        return Ok(());
    }
    let namespace = platform_admin.namespace().unwrap_or_default();
    let name = platform_admin.name_any();
    let mut finalizers = platform_admin.finalizers().to_vec();
    finalizers.push(PLATFORM_ADMIN_FINALIZER.to_string());
    let patch = json!({
        "metadata": {
            "finalizers": finalizers,
            "resourceVersion": platform_admin.resource_version(),
        }
    });
    let patched = ctx
        .cluster
        .patch::<PlatformAdmin>(&namespace, &name, &patch)
        .await
        .map_err(|source| ReconcilerError::Finalizer {
            namespace: namespace.clone(),
            name: name.clone(),
            source,
        })?;
    platform_admin.metadata = patched.metadata;
    info!("Added finalizer");
    Ok(())
}

async fn reconcile_normal<C: ClusterApi>(
    ctx: &Reconciler<C>,
    platform_admin: &mut PlatformAdmin,
    status: &mut PlatformAdminStatus,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let namespace = platform_admin.namespace().unwrap_or_default();
    let name = platform_admin.name_any();
    let Some(uid) = platform_admin.uid() else {
        return Err(ReconcilerError::MissingMetadata {
            namespace,
            name,
            field: "metadata.uid",
        });
    };

    ensure_finalizer(ctx, platform_admin).await?;
    status.initialized = true;

    let desired = match resolve(&ctx.catalog, platform_admin) {
        Ok(desired) => desired,
        Err(source) => {
            set_condition(
                status,
                Condition::new(
                    COMPONENT_AVAILABLE_CONDITION,
                    ConditionStatus::False,
                    COMPONENT_PROVISIONING_FAILED_REASON,
                    &source.to_string(),
                ),
            );
            return Err(ReconcilerError::Resolve {
                namespace,
                name,
                source,
            });
        }
    };

    if let Err(source) = sync_config_maps(&ctx.cluster, platform_admin, &desired.config_maps).await {
        set_condition(
            status,
            Condition::new(
                CONFIGMAP_AVAILABLE_CONDITION,
                ConditionStatus::False,
                CONFIGMAP_PROVISIONING_FAILED_REASON,
                &source.to_string(),
            ),
        );
        return Err(ReconcilerError::ConfigMaps {
            namespace,
            name,
            source,
        });
    }
    set_condition(
        status,
        Condition::new(CONFIGMAP_AVAILABLE_CONDITION, ConditionStatus::True, "", ""),
    );
    collect_config_maps(&ctx.cluster, &namespace, &uid, &desired.config_map_names()).await;

    let mut readiness = ComponentReadiness::new(desired.components.len());
    let synced = sync_components(&ctx.cluster, platform_admin, &desired.components, &mut readiness).await;
    status.ready_component_num = readiness.ready;
    status.unready_component_num = readiness.unready();
    metrics::set_component_counts(&namespace, &name, readiness.ready, readiness.unready());

    if let Err(source) = synced {
        set_condition(
            status,
            Condition::new(
                COMPONENT_AVAILABLE_CONDITION,
                ConditionStatus::False,
                COMPONENT_PROVISIONING_FAILED_REASON,
                &source.to_string(),
            ),
        );
        return Err(ReconcilerError::Components {
            namespace,
            name,
            source,
        });
    }

    collect_services(&ctx.cluster, &namespace, &uid, &desired.service_names()).await;
    collect_workload_sets(
        &ctx.cluster,
        &namespace,
        &uid,
        &platform_admin.spec.pool_name,
        &desired.workload_names(),
    )
    .await;

    if readiness.all_ready() {
        set_condition(
            status,
            Condition::new(COMPONENT_AVAILABLE_CONDITION, ConditionStatus::True, "", ""),
        );
        info!(components = readiness.total, "All components ready");
        return Ok(ReconcileOutcome::Done);
    }

    set_condition(
        status,
        Condition::new(
            COMPONENT_AVAILABLE_CONDITION,
            ConditionStatus::False,
            COMPONENT_PROVISIONING_REASON,
            &format!("{} of {} components ready", readiness.ready, readiness.total),
        ),
    );
    metrics::increment_requeues_total("not-ready");
    debug!(
        ready = readiness.ready,
        total = readiness.total,
        "Components not ready, requeueing"
    );
    Ok(ReconcileOutcome::RequeueAfter(ctx.config.soft_requeue_duration()))
}
