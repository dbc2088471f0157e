//! # Initialization
//!
//! Process bootstrap: rustls setup, tracing, metrics, the probe server,
//! catalog loading, the Kubernetes client and the CRD discovery gate.

use crate::cluster::KubeCluster;
use crate::config::{ComponentCatalog, ControllerConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::PlatformAdmin;
use crate::observability;
use crate::runtime::discovery::required_apis_served;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub platform_admins: Api<PlatformAdmin>,
    pub reconciler: Arc<Reconciler<KubeCluster>>,
    pub server_state: Arc<ServerState>,
    pub config: Arc<ControllerConfig>,
    /// False when the cluster lacks a required CRD; the watch loop is skipped
    pub controller_enabled: bool,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("config", &self.config)
            .field("controller_enabled", &self.controller_enabled)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// Order matters: the crypto provider must exist before any TLS client is
/// built, and the probe server must be up before the first reconcile.
pub async fn initialize() -> Result<InitializationResult> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|existing| {
            anyhow::anyhow!("Failed to install rustls crypto provider, one is already set: {existing:?}")
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "platform_admin_controller=info".into()),
        )
        .init();

    info!("Starting PlatformAdmin controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let config = Arc::new(ControllerConfig::from_env());
    info!(?config, "Loaded controller configuration");

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, server_state_clone).await {
            error!("HTTP server error: {e:#}");
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let catalog = ComponentCatalog::load(&config.catalog_path).with_context(|| {
        format!(
            "Failed to load component catalog from {}",
            config.catalog_path.display()
        )
    })?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let platform_admins: Api<PlatformAdmin> = Api::all(client.clone());

    let controller_enabled = required_apis_served(&client).await?;
    if controller_enabled {
        log_existing_resources(&platform_admins).await;
    } else {
        warn!("Required CRDs are not installed, the PlatformAdmin controller stays disabled");
    }

    let reconciler = Arc::new(Reconciler::new(
        KubeCluster::new(client.clone()),
        Arc::new(catalog),
        Arc::clone(&config),
    ));

    info!("Controller initialized");

    Ok(InitializationResult {
        client,
        platform_admins,
        reconciler,
        server_state,
        config,
        controller_enabled,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = config.server_startup_timeout();
    let poll_interval = config.server_poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Log a per-namespace summary of existing PlatformAdmins.
///
/// Also tells the operator early whether the CRD is installed.
async fn log_existing_resources(platform_admins: &Api<PlatformAdmin>) {
    let list = match platform_admins.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(e) => {
            warn!(
                error = %e,
                "PlatformAdmin CRD is not queryable yet; the watch will retry"
            );
            return;
        }
    };

    let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in &list.items {
        by_namespace
            .entry(item.namespace().unwrap_or_default())
            .or_default()
            .push(item.name_any());
    }

    info!(
        total = list.items.len(),
        namespaces = by_namespace.len(),
        "Found existing PlatformAdmin resources"
    );
    for (namespace, names) in &by_namespace {
        info!(namespace = %namespace, resources = %names.join(", "), "  {} resource(s)", names.len());
    }
}
