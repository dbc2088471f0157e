//! # In-Memory Cluster
//!
//! [`ClusterApi`] implementation holding objects as JSON in process memory.
//!
//! Semantics follow the API server closely enough to exercise the reconciler:
//! - every write bumps a global `resourceVersion`; a stale version is a conflict
//! - main-resource writes never touch `status`, status patches touch nothing else
//! - deleting an object with finalizers only sets `deletionTimestamp`; the
//!   object goes away once its finalizer list is emptied
//! - removing an object strips its uid from dependents' owner references and
//!   deletes dependents left without owners
//!
//! Tests can inject failures per kind and operation and read a mutation counter.
//!
//! This is ephemeral - data does not persist across restarts.
//! Thread-safe using Arc<RwLock> for concurrent access.

use super::{ClusterApi, ClusterError, ManagedObject};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Cluster operations, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    List,
    Create,
    Replace,
    Patch,
    PatchStatus,
    Delete,
}

impl Operation {
    fn is_write(self) -> bool {
        !matches!(self, Operation::Get | Operation::List)
    }
}

/// (kind, namespace, name)
type ObjectKey = (String, String, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultEffect {
    /// The call fails with [`ClusterError::Injected`]
    Fail,
    /// Another writer updates the target object just before the call
    ConcurrentWrite,
}

#[derive(Debug)]
struct Fault {
    kind: String,
    operation: Operation,
    effect: FaultEffect,
    remaining: usize,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ObjectKey, Value>,
    resource_version: u64,
    mutations: u64,
    faults: Vec<Fault>,
}

impl State {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    /// Consume one use of a matching fault; true when one was found
    fn consume_fault(&mut self, kind: &str, operation: Operation, effect: FaultEffect) -> bool {
        let Some(index) = self
            .faults
            .iter()
            .position(|f| f.kind == kind && f.operation == operation && f.effect == effect)
        else {
            return false;
        };
        self.faults[index].remaining -= 1;
        if self.faults[index].remaining == 0 {
            self.faults.remove(index);
        }
        true
    }

    /// Consume a matching injected failure, if any
    fn take_fault(&mut self, kind: &str, operation: Operation) -> Option<ClusterError> {
        self.consume_fault(kind, operation, FaultEffect::Fail)
            .then(|| ClusterError::Injected(format!("{operation:?} {kind}")))
    }

    /// Bump the stored resourceVersion when a concurrent write is pending
    fn race_write(&mut self, key: &ObjectKey, operation: Operation) {
        if !self.consume_fault(&key.0, operation, FaultEffect::ConcurrentWrite) {
            return;
        }
        let rv = self.next_resource_version();
        if let Some(obj) = self.objects.get_mut(key) {
            debug!(kind = %key.0, namespace = %key.1, name = %key.2, "Concurrent write");
            stamp_resource_version(obj, rv);
        }
    }

    /// Remove an object and cascade to dependents
    fn remove(&mut self, key: &ObjectKey) {
        let Some(removed) = self.objects.remove(key) else {
            return;
        };
        debug!(kind = %key.0, namespace = %key.1, name = %key.2, "Object removed");
        let Some(uid) = removed
            .pointer("/metadata/uid")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return;
        };

        let mut orphaned = Vec::new();
        let rv = self.next_resource_version();
        for (dep_key, dep) in &mut self.objects {
            let Some(refs) = dep
                .pointer_mut("/metadata/ownerReferences")
                .and_then(Value::as_array_mut)
            else {
                continue;
            };
            let before = refs.len();
            refs.retain(|r| r.get("uid").and_then(Value::as_str) != Some(uid.as_str()));
            if refs.len() == before {
                continue;
            }
            if refs.is_empty() {
                orphaned.push(dep_key.clone());
            } else if let Some(meta) = dep.get_mut("metadata").and_then(Value::as_object_mut) {
                meta.insert("resourceVersion".to_string(), Value::String(rv.clone()));
            }
        }
        for dep_key in orphaned {
            self.remove(&dep_key);
        }
    }

    /// Finish a pending deletion once no finalizer is left
    fn finalize_if_released(&mut self, key: &ObjectKey) {
        let Some(obj) = self.objects.get(key) else {
            return;
        };
        let deleting = obj.pointer("/metadata/deletionTimestamp").is_some_and(|v| !v.is_null());
        if deleting && finalizers(obj).is_empty() {
            self.remove(key);
        }
    }
}

fn finalizers(obj: &Value) -> Vec<&str> {
    obj.pointer("/metadata/finalizers")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn labels_of(obj: &Value) -> BTreeMap<String, String> {
    obj.pointer("/metadata/labels")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Evaluate an equality-based label selector (`a=b`, `a==b`, `a!=b`, `a`, `!a`)
fn matches_selector(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            if let Some((key, value)) = term.split_once("!=") {
                labels.get(key.trim()).map(String::as_str) != Some(value.trim())
            } else if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('=')) {
                labels.get(key.trim()).map(String::as_str) == Some(value.trim())
            } else if let Some(key) = term.strip_prefix('!') {
                !labels.contains_key(key.trim())
            } else {
                labels.contains_key(term)
            }
        })
}

fn decode<K: ManagedObject>(value: &Value) -> Result<K, ClusterError> {
    Ok(serde_json::from_value(value.clone())?)
}

fn key_of<K: ManagedObject>(namespace: &str, name: &str) -> ObjectKey {
    (K::kind(&()).to_string(), namespace.to_string(), name.to_string())
}

/// Metadata map of a stored object, created when absent. `None` for non-objects.
fn metadata_mut(obj: &mut Value) -> Option<&mut Map<String, Value>> {
    let meta = obj
        .as_object_mut()?
        .entry("metadata")
        .or_insert_with(|| json!({}));
    if !meta.is_object() {
        *meta = json!({});
    }
    meta.as_object_mut()
}

fn stamp_resource_version(obj: &mut Value, rv: String) {
    if let Some(meta) = metadata_mut(obj) {
        meta.insert("resourceVersion".to_string(), Value::String(rv));
    }
}

/// Copy server-owned metadata from the stored object
fn carry_server_fields(stored: &Value, updated: &mut Value) {
    let Some(meta) = metadata_mut(updated) else {
        return;
    };
    for field in ["uid", "creationTimestamp", "deletionTimestamp"] {
        match stored.pointer(&format!("/metadata/{field}")) {
            Some(v) => {
                meta.insert(field.to_string(), v.clone());
            }
            None => {
                meta.remove(field);
            }
        }
    }
}

/// Thread-safe in-memory [`ClusterApi`]
#[derive(Clone, Debug, Default)]
pub struct InMemoryCluster {
    state: Arc<RwLock<State>>,
}

impl InMemoryCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful write calls served so far
    pub async fn mutation_count(&self) -> u64 {
        self.state.read().await.mutations
    }

    /// Make the next call of `operation` on `kind` fail
    pub async fn fail_next(&self, kind: &str, operation: Operation) {
        self.fail_times(kind, operation, 1).await;
    }

    /// Make the next `times` calls of `operation` on `kind` fail
    pub async fn fail_times(&self, kind: &str, operation: Operation, times: usize) {
        if times == 0 {
            return;
        }
        self.state.write().await.faults.push(Fault {
            kind: kind.to_string(),
            operation,
            effect: FaultEffect::Fail,
            remaining: times,
        });
    }

    /// Let another writer update the target object right before the next
    /// `operation` on `kind`, so a version-pinned write goes stale.
    /// The concurrent write is not counted as a mutation.
    pub async fn race_next(&self, kind: &str, operation: Operation) {
        self.state.write().await.faults.push(Fault {
            kind: kind.to_string(),
            operation,
            effect: FaultEffect::ConcurrentWrite,
            remaining: 1,
        });
    }

    /// Overwrite an object's status as another controller would.
    /// Not counted as a mutation.
    pub async fn set_status<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        status: Value,
    ) -> Result<(), ClusterError> {
        let key = key_of::<K>(namespace, name);
        let mut state = self.state.write().await;
        let rv = state.next_resource_version();
        let obj = state
            .objects
            .get_mut(&key)
            .ok_or_else(|| not_found(&key))?;
        if let Some(map) = obj.as_object_mut() {
            map.insert("status".to_string(), status);
        }
        stamp_resource_version(obj, rv);
        Ok(())
    }

    /// Number of stored objects of the given kind in a namespace
    pub async fn count<K: ManagedObject>(&self, namespace: &str) -> usize {
        let kind = K::kind(&()).to_string();
        self.state
            .read()
            .await
            .objects
            .keys()
            .filter(|(k, ns, _)| *k == kind && ns == namespace)
            .count()
    }

    async fn begin(&self, kind: &str, operation: Operation) -> Result<(), ClusterError> {
        let mut state = self.state.write().await;
        if let Some(err) = state.take_fault(kind, operation) {
            return Err(err);
        }
        if operation.is_write() {
            state.mutations += 1;
        }
        Ok(())
    }
}

fn not_found(key: &ObjectKey) -> ClusterError {
    ClusterError::NotFound {
        kind: key.0.clone(),
        namespace: key.1.clone(),
        name: key.2.clone(),
    }
}

fn not_an_object(key: &ObjectKey) -> ClusterError {
    ClusterError::Invalid {
        kind: key.0.clone(),
        namespace: key.1.clone(),
        name: key.2.clone(),
        message: "object must serialize to a JSON object".to_string(),
    }
}

fn conflict(key: &ObjectKey, message: String) -> ClusterError {
    ClusterError::Conflict {
        kind: key.0.clone(),
        namespace: key.1.clone(),
        name: key.2.clone(),
        message,
    }
}

fn check_resource_version(
    key: &ObjectKey,
    stored: &Value,
    requested: Option<&str>,
) -> Result<(), ClusterError> {
    let Some(requested) = requested else {
        return Ok(());
    };
    let current = stored
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if requested == current {
        Ok(())
    } else {
        Err(conflict(
            key,
            format!("the object has been modified (have {requested}, current {current})"),
        ))
    }
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn get<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, ClusterError> {
        let key = key_of::<K>(namespace, name);
        self.begin(&key.0, Operation::Get).await?;
        let state = self.state.read().await;
        state.objects.get(&key).map(decode::<K>).transpose()
    }

    async fn list<K: ManagedObject>(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<K>, ClusterError> {
        let kind = K::kind(&()).to_string();
        self.begin(&kind, Operation::List).await?;
        let state = self.state.read().await;
        state
            .objects
            .iter()
            .filter(|((k, ns, _), obj)| {
                *k == kind && ns == namespace && matches_selector(label_selector, &labels_of(obj))
            })
            .map(|(_, obj)| decode::<K>(obj))
            .collect()
    }

    async fn create<K: ManagedObject>(&self, namespace: &str, obj: &K) -> Result<K, ClusterError> {
        let name = obj.meta().name.clone().unwrap_or_default();
        let key = key_of::<K>(namespace, &name);
        if name.is_empty() {
            return Err(ClusterError::Invalid {
                kind: key.0,
                namespace: key.1,
                name,
                message: "metadata.name is required".to_string(),
            });
        }
        self.begin(&key.0, Operation::Create).await?;

        let mut value = serde_json::to_value(obj)?;
        let mut state = self.state.write().await;
        if state.objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                kind: key.0,
                namespace: key.1,
                name: key.2,
            });
        }
        let rv = state.next_resource_version();
        let Some(meta) = metadata_mut(&mut value) else {
            return Err(not_an_object(&key));
        };
        meta.insert("namespace".to_string(), Value::String(namespace.to_string()));
        meta.insert("resourceVersion".to_string(), Value::String(rv));
        meta.insert(
            "uid".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
        meta.insert(
            "creationTimestamp".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
        );
        meta.remove("deletionTimestamp");
        let created = decode::<K>(&value)?;
        state.objects.insert(key, value);
        Ok(created)
    }

    async fn replace<K: ManagedObject>(&self, namespace: &str, obj: &K) -> Result<K, ClusterError> {
        let name = obj.meta().name.clone().unwrap_or_default();
        let key = key_of::<K>(namespace, &name);
        self.begin(&key.0, Operation::Replace).await?;

        let mut value = serde_json::to_value(obj)?;
        let mut state = self.state.write().await;
        state.race_write(&key, Operation::Replace);
        let stored = state.objects.get(&key).ok_or_else(|| not_found(&key))?.clone();
        check_resource_version(&key, &stored, obj.meta().resource_version.as_deref())?;

        carry_server_fields(&stored, &mut value);
        if let Some(map) = value.as_object_mut() {
            match stored.get("status") {
                Some(status) => {
                    map.insert("status".to_string(), status.clone());
                }
                None => {
                    map.remove("status");
                }
            }
        }
        let rv = state.next_resource_version();
        let Some(meta) = metadata_mut(&mut value) else {
            return Err(not_an_object(&key));
        };
        meta.insert("namespace".to_string(), Value::String(namespace.to_string()));
        meta.insert("resourceVersion".to_string(), Value::String(rv));
        let replaced = decode::<K>(&value)?;
        state.objects.insert(key.clone(), value);
        state.finalize_if_released(&key);
        Ok(replaced)
    }

    async fn patch<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, ClusterError> {
        let key = key_of::<K>(namespace, name);
        self.begin(&key.0, Operation::Patch).await?;

        let mut state = self.state.write().await;
        state.race_write(&key, Operation::Patch);
        let stored = state.objects.get(&key).ok_or_else(|| not_found(&key))?.clone();
        check_resource_version(
            &key,
            &stored,
            patch.pointer("/metadata/resourceVersion").and_then(Value::as_str),
        )?;

        let mut body = patch.clone();
        if let Some(map) = body.as_object_mut() {
            map.remove("status");
        }
        let mut value = stored.clone();
        json_patch::merge(&mut value, &body);
        carry_server_fields(&stored, &mut value);
        let rv = state.next_resource_version();
        stamp_resource_version(&mut value, rv);
        let patched = decode::<K>(&value).map_err(|e| ClusterError::Invalid {
            kind: key.0.clone(),
            namespace: key.1.clone(),
            name: key.2.clone(),
            message: e.to_string(),
        })?;
        state.objects.insert(key.clone(), value);
        state.finalize_if_released(&key);
        Ok(patched)
    }

    async fn patch_status<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, ClusterError> {
        let key = key_of::<K>(namespace, name);
        self.begin(&key.0, Operation::PatchStatus).await?;

        let mut state = self.state.write().await;
        state.race_write(&key, Operation::PatchStatus);
        let stored = state.objects.get(&key).ok_or_else(|| not_found(&key))?.clone();
        check_resource_version(
            &key,
            &stored,
            patch.pointer("/metadata/resourceVersion").and_then(Value::as_str),
        )?;

        let mut value = stored;
        if let Some(status_patch) = patch.get("status") {
            let status = value
                .as_object_mut()
                .map(|m| m.entry("status").or_insert_with(|| json!({})));
            if let Some(status) = status {
                json_patch::merge(status, status_patch);
            }
        }
        let rv = state.next_resource_version();
        stamp_resource_version(&mut value, rv);
        let patched = decode::<K>(&value)?;
        state.objects.insert(key, value);
        Ok(patched)
    }

    async fn delete<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let key = key_of::<K>(namespace, name);
        self.begin(&key.0, Operation::Delete).await?;

        let mut state = self.state.write().await;
        let Some(stored) = state.objects.get(&key) else {
            return Ok(());
        };
        if finalizers(stored).is_empty() {
            state.remove(&key);
            return Ok(());
        }
        if stored.pointer("/metadata/deletionTimestamp").is_none() {
            let rv = state.next_resource_version();
            if let Some(meta) = state.objects.get_mut(&key).and_then(metadata_mut) {
                meta.insert(
                    "deletionTimestamp".to_string(),
                    Value::String(
                        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                    ),
                );
                meta.insert("resourceVersion".to_string(), Value::String(rv));
            }
        }
        Ok(())
    }
}
