//! # Cluster Access
//!
//! The reconciler talks to the cluster only through [`ClusterApi`]. Two
//! implementations exist:
//! - [`KubeCluster`]: the live API server through `kube::Api`
//! - [`InMemoryCluster`]: a thread-safe store with API-server semantics
//!   (resourceVersion conflicts, finalizers, owner-reference cascade)
//!
//! All writes are namespaced and all patches are JSON merge patches.

mod client;
mod memory;
pub mod patch;

pub use client::KubeCluster;
pub use memory::{InMemoryCluster, Operation};

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use thiserror::Error;

/// Any namespaced object the controller reads or writes
pub trait ManagedObject:
    kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ManagedObject for K where
    K: kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("{kind} {namespace}/{name} is invalid: {message}")]
    Invalid {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },
    #[error("kubernetes API error: {0}")]
    Api(#[source] kube::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Failure injected by [`InMemoryCluster`]
    #[error("injected failure: {0}")]
    Injected(String),
}

impl ClusterError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            ClusterError::NotFound { .. } => true,
            ClusterError::Api(kube::Error::Api(e)) => e.code == 404,
            _ => false,
        }
    }

    /// Optimistic concurrency failure; the pass should be retried
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            ClusterError::Conflict { .. } => true,
            ClusterError::Api(kube::Error::Api(e)) => e.code == 409 && e.reason == "Conflict",
            _ => false,
        }
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            ClusterError::AlreadyExists { .. } => true,
            ClusterError::Api(kube::Error::Api(e)) => {
                e.code == 409 && e.reason == "AlreadyExists"
            }
            _ => false,
        }
    }
}

/// Namespaced object access used by the reconciler
///
/// `get` maps not-found to `Ok(None)`. `delete` of a missing object is `Ok`.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str)
        -> Result<Option<K>, ClusterError>;

    /// List objects matching a label selector (`key`, `key=value`, comma-joined)
    async fn list<K: ManagedObject>(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<K>, ClusterError>;

    async fn create<K: ManagedObject>(&self, namespace: &str, obj: &K) -> Result<K, ClusterError>;

    /// Full update; fails with a conflict when `metadata.resourceVersion` is stale
    async fn replace<K: ManagedObject>(&self, namespace: &str, obj: &K) -> Result<K, ClusterError>;

    /// JSON merge patch (RFC 7386) of the main resource
    async fn patch<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, ClusterError>;

    /// JSON merge patch of the status subresource
    async fn patch_status<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, ClusterError>;

    async fn delete<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}
