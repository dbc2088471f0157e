//! Live cluster access through `kube::Api`.

use super::{ClusterApi, ClusterError, ManagedObject};
use crate::constants::FIELD_MANAGER;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::Value;
use tracing::debug;

/// [`ClusterApi`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

impl KubeCluster {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api<K: ManagedObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..PostParams::default()
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn get<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, ClusterError> {
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(ClusterError::Api)
    }

    async fn list<K: ManagedObject>(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<K>, ClusterError> {
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default().labels(label_selector))
            .await
            .map_err(ClusterError::Api)?;
        Ok(list.items)
    }

    async fn create<K: ManagedObject>(&self, namespace: &str, obj: &K) -> Result<K, ClusterError> {
        self.api::<K>(namespace)
            .create(&post_params(), obj)
            .await
            .map_err(ClusterError::Api)
    }

    async fn replace<K: ManagedObject>(&self, namespace: &str, obj: &K) -> Result<K, ClusterError> {
        let name = obj.meta().name.clone().unwrap_or_default();
        self.api::<K>(namespace)
            .replace(&name, &post_params(), obj)
            .await
            .map_err(ClusterError::Api)
    }

    async fn patch<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, ClusterError> {
        self.api::<K>(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(ClusterError::Api)
    }

    async fn patch_status<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, ClusterError> {
        self.api::<K>(namespace)
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(ClusterError::Api)
    }

    async fn delete<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!(kind = %K::kind(&()), namespace, name, "Object already gone");
                Ok(())
            }
            Err(e) => Err(ClusterError::Api(e)),
        }
    }
}
