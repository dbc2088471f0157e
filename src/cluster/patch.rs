//! # JSON Merge Patch
//!
//! RFC 7386 diff helpers. The reconciler fetches an object, edits a copy and
//! sends the difference as a merge patch. Arrays are replaced wholesale.
//! Applying a patch is left to `json_patch::merge`.

use serde::Serialize;
use serde_json::{Map, Value};

/// Compute the merge patch turning `original` into `modified`.
///
/// Keys missing from `modified` become `null`. An empty object means no change.
#[must_use]
pub fn create_merge_patch(original: &Value, modified: &Value) -> Value {
    match (original, modified) {
        (Value::Object(orig), Value::Object(modi)) => {
            let mut patch = Map::new();
            for key in orig.keys() {
                if !modi.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            for (key, new_value) in modi {
                match orig.get(key) {
                    Some(old_value) if old_value == new_value => {}
                    Some(old_value @ Value::Object(_)) if new_value.is_object() => {
                        patch.insert(key.clone(), create_merge_patch(old_value, new_value));
                    }
                    _ => {
                        patch.insert(key.clone(), new_value.clone());
                    }
                }
            }
            Value::Object(patch)
        }
        _ => modified.clone(),
    }
}

/// True when the patch carries no change
#[must_use]
pub fn is_empty_patch(patch: &Value) -> bool {
    patch.as_object().is_some_and(Map::is_empty)
}

/// Merge patch between two typed objects, pinned to `resource_version` when given.
///
/// Pinning makes the server reject the patch with a conflict if the object
/// changed since it was read.
pub fn diff<T: Serialize>(
    original: &T,
    modified: &T,
    resource_version: Option<&str>,
) -> Result<Value, serde_json::Error> {
    let mut patch = create_merge_patch(
        &serde_json::to_value(original)?,
        &serde_json::to_value(modified)?,
    );
    if let Some(rv) = resource_version {
        if !is_empty_patch(&patch) {
            pin_resource_version(&mut patch, rv);
        }
    }
    Ok(patch)
}

/// Add `metadata.resourceVersion` to a patch for optimistic locking
pub fn pin_resource_version(patch: &mut Value, resource_version: &str) {
    if let Value::Object(map) = patch {
        let metadata = map
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(meta) = metadata {
            meta.insert(
                "resourceVersion".to_string(),
                Value::String(resource_version.to_string()),
            );
        }
    }
}
