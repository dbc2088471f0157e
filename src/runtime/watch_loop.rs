//! # Watch Loop
//!
//! Runs the `kube_runtime` controller over PlatformAdmins and their labelled
//! children. The controller queue deduplicates triggers and never runs two
//! passes for the same PlatformAdmin at once.

use crate::cluster::KubeCluster;
use crate::constants::LABEL_PLATFORM_ADMIN_GENERATE;
use crate::controller::reconciler::{
    reconcile_platform_admin, ReconcileOutcome, Reconciler, ReconcilerError,
};
use crate::controller::server::ServerState;
use crate::crd::{PlatformAdmin, YurtAppSet};
use crate::runtime::error_policy::handle_reconciliation_error;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::api::Api;
use kube::{Client, Resource, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{controller, controller::Action, watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// PlatformAdmins listed as owners of a child
///
/// Co-owners count too, so a change to a shared workload-set wakes every
/// PlatformAdmin with a pool in it.
pub fn owning_platform_admins<K: Resource>(child: &K) -> Vec<ObjectRef<PlatformAdmin>> {
    let api_version = PlatformAdmin::api_version(&());
    let kind = PlatformAdmin::kind(&());
    let namespace = child.meta().namespace.clone().unwrap_or_default();
    child
        .meta()
        .owner_references
        .iter()
        .flatten()
        .filter(|owner| owner.api_version == api_version && owner.kind == kind)
        .map(|owner| ObjectRef::new(&owner.name).within(&namespace))
        .collect()
}

fn children_config() -> watcher::Config {
    watcher::Config::default().labels(LABEL_PLATFORM_ADMIN_GENERATE)
}

async fn reconcile(
    obj: Arc<PlatformAdmin>,
    ctx: Arc<Reconciler<KubeCluster>>,
) -> Result<Action, ReconcilerError> {
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    match reconcile_platform_admin(&ctx, &namespace, &name).await? {
        ReconcileOutcome::Done => Ok(Action::await_change()),
        ReconcileOutcome::RequeueAfter(delay) => Ok(Action::requeue(delay)),
    }
}

/// Keep the probe server alive without a controller until a shutdown signal arrives
pub async fn idle_until_shutdown(server_state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    info!("Controller disabled, serving probes until shutdown");
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    server_state.set_ready(false);
    Ok(())
}

/// Run the controller until a shutdown signal arrives
pub async fn run_watch_loop(
    client: Client,
    platform_admins: Api<PlatformAdmin>,
    reconciler: Arc<Reconciler<KubeCluster>>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, initiating graceful shutdown...");
            shutdown_state.set_ready(false);
        }
    });

    let workers = reconciler.config.workers;
    let restart_delay = reconciler.config.watch_restart_delay_duration();

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        info!(workers, "Starting controller watch loop...");
        Controller::new(platform_admins.clone(), watcher::Config::default())
            .with_config(controller::Config::default().concurrency(workers))
            .watches(
                Api::<ConfigMap>::all(client.clone()),
                children_config(),
                |cm| owning_platform_admins(&cm),
            )
            .watches(
                Api::<Service>::all(client.clone()),
                children_config(),
                |svc| owning_platform_admins(&svc),
            )
            .watches(
                Api::<YurtAppSet>::all(client.clone()),
                children_config(),
                |yas| owning_platform_admins(&yas),
            )
            .shutdown_on_signal()
            .run(
                reconcile,
                handle_reconciliation_error::<KubeCluster>,
                Arc::clone(&reconciler),
            )
            .for_each(|result| async move {
                match result {
                    Ok((obj_ref, action)) => debug!(%obj_ref, ?action, "Reconciled"),
                    Err(e) => warn!(error = %e, "Controller stream error"),
                }
            })
            .await;

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
