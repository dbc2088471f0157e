//! # Reconciler Types
//!
//! Shared context, outcome and error types for the reconciler.

use crate::cluster::{ClusterApi, ClusterError, KubeCluster};
use crate::config::{ComponentCatalog, ControllerConfig};
use crate::controller::backoff::BackoffState;
use crate::controller::reconciler::resolve::ResolveError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Reconciler context shared by all workers
///
/// Holds no per-pass state; the only mutable data is the per-resource backoff
/// bookkeeping used by the error policy.
pub struct Reconciler<C: ClusterApi = KubeCluster> {
    pub cluster: C,
    pub catalog: Arc<ComponentCatalog>,
    pub config: Arc<ControllerConfig>,
    /// Backoff state keyed by `namespace/name`
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl<C: ClusterApi> std::fmt::Debug for Reconciler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: ClusterApi> Reconciler<C> {
    pub fn new(cluster: C, catalog: Arc<ComponentCatalog>, config: Arc<ControllerConfig>) -> Self {
        Self {
            cluster,
            catalog,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the error history of a resource after a successful pass
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }
}

/// Result of one reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged; wait for the next change
    Done,
    /// Not converged yet (components rolling out); look again later
    RequeueAfter(Duration),
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to get PlatformAdmin {namespace}/{name}: {source}")]
    Get {
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },
    #[error("PlatformAdmin {namespace}/{name} has no {field}")]
    MissingMetadata {
        namespace: String,
        name: String,
        field: &'static str,
    },
    #[error("failed to update finalizers of PlatformAdmin {namespace}/{name}: {source}")]
    Finalizer {
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },
    #[error("failed to resolve components for {namespace}/{name}: {source}")]
    Resolve {
        namespace: String,
        name: String,
        #[source]
        source: ResolveError,
    },
    #[error("unexpected error while reconciling configmap for {namespace}/{name}: {source}")]
    ConfigMaps {
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },
    #[error("unexpected error while reconciling component for {namespace}/{name}: {source}")]
    Components {
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },
    #[error("failed to leave pool of YurtAppSet {namespace}/{component}: {source}")]
    ReleasePool {
        namespace: String,
        component: String,
        #[source]
        source: ClusterError,
    },
    #[error("failed to update status of PlatformAdmin {namespace}/{name}: {source}")]
    Status {
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },
    /// The pass failed and persisting the status failed as well
    #[error("{original}; additionally failed to update status: {status}")]
    Aggregate {
        original: Box<ReconcilerError>,
        status: ClusterError,
    },
}

impl ReconcilerError {
    /// The underlying cluster error, if any
    #[must_use]
    pub fn cluster_error(&self) -> Option<&ClusterError> {
        match self {
            ReconcilerError::Get { source, .. }
            | ReconcilerError::Finalizer { source, .. }
            | ReconcilerError::ConfigMaps { source, .. }
            | ReconcilerError::Components { source, .. }
            | ReconcilerError::ReleasePool { source, .. }
            | ReconcilerError::Status { source, .. } => Some(source),
            ReconcilerError::Aggregate { original, .. } => original.cluster_error(),
            ReconcilerError::MissingMetadata { .. } | ReconcilerError::Resolve { .. } => None,
        }
    }

    /// Optimistic concurrency failure somewhere in the pass
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            ReconcilerError::Aggregate { original, status } => {
                original.is_conflict() || status.is_conflict()
            }
            other => other.cluster_error().is_some_and(ClusterError::is_conflict),
        }
    }
}
