//! # API Discovery
//!
//! The controller only starts when the cluster serves every kind it reads or
//! writes. Without the CRDs the watches would fail forever.

use crate::crd::{PlatformAdmin, YurtAppSet};
use anyhow::{Context, Result};
use kube::core::GroupVersionKind;
use kube::discovery::Discovery;
use kube::{Client, Resource};
use tracing::{info, warn};

/// Custom kinds the controller depends on
#[must_use]
pub fn required_kinds() -> Vec<GroupVersionKind> {
    vec![gvk_of::<PlatformAdmin>(), gvk_of::<YurtAppSet>()]
}

fn gvk_of<K: Resource<DynamicType = ()>>() -> GroupVersionKind {
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}

/// Required kinds for which `is_served` is false
pub fn missing_kinds<F>(is_served: F) -> Vec<GroupVersionKind>
where
    F: Fn(&GroupVersionKind) -> bool,
{
    required_kinds()
        .into_iter()
        .filter(|gvk| !is_served(gvk))
        .collect()
}

/// Ask the API server whether every required kind is served.
///
/// Only the groups of the required kinds are queried.
pub async fn required_apis_served(client: &Client) -> Result<bool> {
    let kinds = required_kinds();
    let groups: Vec<&str> = kinds.iter().map(|gvk| gvk.group.as_str()).collect();
    let discovery = Discovery::new(client.clone())
        .filter(&groups)
        .run()
        .await
        .context("Failed to run API discovery")?;

    let missing = missing_kinds(|gvk| discovery.resolve_gvk(gvk).is_some());
    if missing.is_empty() {
        info!("Required APIs are served");
        return Ok(true);
    }
    for gvk in &missing {
        warn!(
            group = %gvk.group,
            version = %gvk.version,
            kind = %gvk.kind,
            "API kind is not served by the cluster"
        );
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_kinds() {
        let kinds = required_kinds();
        assert_eq!(
            kinds,
            vec![
                GroupVersionKind::gvk("iot.openyurt.io", "v1alpha2", "PlatformAdmin"),
                GroupVersionKind::gvk("apps.openyurt.io", "v1alpha1", "YurtAppSet"),
            ]
        );
    }

    #[test]
    fn test_missing_kinds_reports_unserved_only() {
        assert!(missing_kinds(|_| true).is_empty());
        assert_eq!(missing_kinds(|_| false).len(), 2);

        let missing = missing_kinds(|gvk| gvk.kind == "PlatformAdmin");
        assert_eq!(
            missing,
            vec![GroupVersionKind::gvk("apps.openyurt.io", "v1alpha1", "YurtAppSet")]
        );
    }
}
