//! # PlatformAdmin Controller
//!
//! Kubernetes controller for OpenYurt edge platforms.
//!
//! A `PlatformAdmin` names a platform version and a node pool. The controller
//! deploys the version's ConfigMaps and Services, and adds the pool to one
//! `YurtAppSet` per component so the workloads run on that pool's nodes.
//! Several PlatformAdmins in different pools share the same workload-sets.
//!
//! ## Configuration
//!
//! Environment variables (all optional):
//! - `PLATFORMADMIN_WORKERS`: parallel reconciles (default 3)
//! - `SOFT_REQUEUE_SECS`: recheck delay while components roll out (default 10)
//! - `BACKOFF_MIN_SECS` / `BACKOFF_MAX_SECS`: error backoff bounds
//! - `COMPONENT_CATALOG_PATH`: YAML catalog of components per version
//! - `METRICS_PORT`: port for `/metrics`, `/healthz` and `/readyz`
//! - `RUST_LOG`: log filter (default `platform_admin_controller=info`)

use anyhow::Result;
use platform_admin_controller::runtime::{idle_until_shutdown, initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    if !init.controller_enabled {
        return idle_until_shutdown(init.server_state).await;
    }
    run_watch_loop(
        init.client,
        init.platform_admins,
        init.reconciler,
        init.server_state,
    )
    .await
}
