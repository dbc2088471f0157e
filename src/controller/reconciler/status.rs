//! # Status Management
//!
//! Condition bookkeeping and the single status write at the end of a pass.

use crate::cluster::{ClusterApi, ClusterError};
use crate::crd::{
    Condition, PlatformAdmin, PlatformAdminStatus, COMPONENT_AVAILABLE_CONDITION,
    CONFIGMAP_AVAILABLE_CONDITION,
};
use chrono::{SecondsFormat, Utc};
use kube::ResourceExt;
use serde_json::json;
use tracing::debug;

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Insert or replace the condition with the same type.
///
/// The transition time only moves when the status value flips.
pub fn set_condition(status: &mut PlatformAdminStatus, condition: Condition) {
    set_condition_at(status, condition, &now());
}

pub(crate) fn set_condition_at(status: &mut PlatformAdminStatus, mut condition: Condition, at: &str) {
    match status
        .conditions
        .iter_mut()
        .find(|c| c.r#type == condition.r#type)
    {
        Some(existing) => {
            condition.last_transition_time = if existing.status == condition.status {
                existing.last_transition_time.clone()
            } else {
                Some(at.to_string())
            };
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Some(at.to_string());
            status.conditions.push(condition);
        }
    }
}

#[must_use]
pub fn get_condition<'a>(status: &'a PlatformAdminStatus, r#type: &str) -> Option<&'a Condition> {
    status.conditions.iter().find(|c| c.r#type == r#type)
}

/// Ready when both availability conditions are true
#[must_use]
pub fn is_ready(status: &PlatformAdminStatus) -> bool {
    [CONFIGMAP_AVAILABLE_CONDITION, COMPONENT_AVAILABLE_CONDITION]
        .iter()
        .all(|t| get_condition(status, t).is_some_and(Condition::is_true))
}

/// Write `new` to the status subresource unless it equals `original`
pub async fn persist_status<C: ClusterApi>(
    cluster: &C,
    platform_admin: &PlatformAdmin,
    original: Option<&PlatformAdminStatus>,
    new: &PlatformAdminStatus,
) -> Result<(), ClusterError> {
    let namespace = platform_admin.namespace().unwrap_or_default();
    let name = platform_admin.name_any();
    if original == Some(new) {
        debug!(resource.namespace = %namespace, resource.name = %name, "Status unchanged");
        return Ok(());
    }
    let patch = json!({ "status": new });
    cluster
        .patch_status::<PlatformAdmin>(&namespace, &name, &patch)
        .await?;
    debug!(
        resource.namespace = %namespace,
        resource.name = %name,
        ready = new.ready,
        "Updated status"
    );
    Ok(())
}
