//! # Child Ownership
//!
//! A child belongs to a PlatformAdmin through two records: the generate label
//! (found by the GC scan) and an owner reference (followed by cascade
//! deletion). [`claim`] writes both at once so they never disagree.

use crate::constants::{LABEL_CONFIGMAP, LABEL_DEPLOYMENT, LABEL_PLATFORM_ADMIN_GENERATE, LABEL_SERVICE};
use crate::crd::PlatformAdmin;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;

/// Kinds of children this controller generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    ConfigMap,
    Service,
    WorkloadSet,
}

impl ChildKind {
    /// Value of the generate label
    #[must_use]
    pub fn label_value(self) -> &'static str {
        match self {
            ChildKind::ConfigMap => LABEL_CONFIGMAP,
            ChildKind::Service => LABEL_SERVICE,
            ChildKind::WorkloadSet => LABEL_DEPLOYMENT,
        }
    }

    /// Label selector matching every child of this kind
    #[must_use]
    pub fn selector(self) -> String {
        format!("{LABEL_PLATFORM_ADMIN_GENERATE}={}", self.label_value())
    }

    /// Kubernetes kind name, used for logs and metric labels
    #[must_use]
    pub fn kind(self) -> &'static str {
        match self {
            ChildKind::ConfigMap => "ConfigMap",
            ChildKind::Service => "Service",
            ChildKind::WorkloadSet => "YurtAppSet",
        }
    }
}

/// Owner reference pointing at the PlatformAdmin.
///
/// `controller` marks the PlatformAdmin as the managing controller; only the
/// creator of a shared workload-set gets that flag. `None` if the parent has
/// no uid yet.
#[must_use]
pub fn owner_reference(platform_admin: &PlatformAdmin, controller: bool) -> Option<OwnerReference> {
    let owner = platform_admin.owner_ref(&())?;
    Some(if controller {
        OwnerReference {
            controller: Some(true),
            block_owner_deletion: Some(true),
            ..owner
        }
    } else {
        owner
    })
}

/// Stamp the generate label and the owner reference on a child.
///
/// Returns true if the metadata changed.
pub fn claim(meta: &mut ObjectMeta, kind: ChildKind, owner: OwnerReference) -> bool {
    let labels = meta.labels.get_or_insert_with(Default::default);
    let label_changed = labels.get(LABEL_PLATFORM_ADMIN_GENERATE).map(String::as_str)
        != Some(kind.label_value());
    if label_changed {
        labels.insert(
            LABEL_PLATFORM_ADMIN_GENERATE.to_string(),
            kind.label_value().to_string(),
        );
    }

    let refs = meta.owner_references.get_or_insert_with(Vec::new);
    let owner_added = if refs.iter().any(|r| r.uid == owner.uid) {
        false
    } else {
        refs.push(owner);
        true
    };

    label_changed || owner_added
}

#[must_use]
pub fn is_owned_by(meta: &ObjectMeta, uid: &str) -> bool {
    meta.owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.uid == uid))
}

/// Drop every owner reference with the given uid.
///
/// Returns true if one was removed.
pub fn release(meta: &mut ObjectMeta, uid: &str) -> bool {
    let Some(refs) = meta.owner_references.as_mut() else {
        return false;
    };
    let before = refs.len();
    refs.retain(|r| r.uid != uid);
    refs.len() != before
}

/// True when no owner reference is left
#[must_use]
pub fn is_orphan(meta: &ObjectMeta) -> bool {
    meta.owner_references.as_ref().is_none_or(Vec::is_empty)
}
