//! # Pool Membership
//!
//! Pure helpers building workload-sets and editing their pool lists. A
//! PlatformAdmin owns exactly one pool entry (named after its `poolName`) in
//! each of its workload-sets; other entries belong to other PlatformAdmins
//! and are never modified.

use crate::config::Component;
use crate::constants::{LABEL_APP, LABEL_CURRENT_NODE_POOL};
use crate::crd::{
    DeploymentTemplateSpec, PlatformAdmin, Pool, Topology, WorkloadTemplate, YurtAppSet,
    YurtAppSetSpec,
};
use k8s_openapi::api::apps::v1::DeploymentSpec;
use k8s_openapi::api::core::v1::{NodeSelectorRequirement, NodeSelectorTerm};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

/// Pool entry placing one replica on the nodes of `pool_name`
#[must_use]
pub fn pool_entry(pool_name: &str) -> Pool {
    Pool {
        name: pool_name.to_string(),
        node_selector_term: Some(NodeSelectorTerm {
            match_expressions: Some(vec![NodeSelectorRequirement {
                key: LABEL_CURRENT_NODE_POOL.to_string(),
                operator: "In".to_string(),
                values: Some(vec![pool_name.to_string()]),
            }]),
            match_fields: None,
        }),
        replicas: Some(1),
        ..Pool::default()
    }
}

/// Append our pool unless an entry with that name exists.
///
/// Returns true if the list changed.
pub fn join_pool(pools: &mut Vec<Pool>, pool_name: &str) -> bool {
    if pools.iter().any(|p| p.name == pool_name) {
        return false;
    }
    pools.push(pool_entry(pool_name));
    true
}

/// Remove our pool entry, keeping the order of the others.
///
/// Returns true if the list changed.
pub fn leave_pool(pools: &mut Vec<Pool>, pool_name: &str) -> bool {
    let mut changed = false;
    while let Some(index) = pools.iter().position(|p| p.name == pool_name) {
        pools.remove(index);
        changed = true;
    }
    changed
}

fn app_labels(component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(LABEL_APP.to_string(), component.to_string())])
}

/// Fresh workload-set for a component, holding only our pool.
///
/// Ownership metadata is stamped by the caller.
#[must_use]
pub fn new_workload_set(
    platform_admin: &PlatformAdmin,
    component: &Component,
    deployment: &DeploymentSpec,
) -> YurtAppSet {
    let mut yas = YurtAppSet::new(
        &component.name,
        YurtAppSetSpec {
            selector: Some(LabelSelector {
                match_labels: Some(app_labels(&component.name)),
                match_expressions: None,
            }),
            workload_template: WorkloadTemplate {
                deployment_template: Some(DeploymentTemplateSpec {
                    metadata: ObjectMeta {
                        labels: Some(app_labels(&component.name)),
                        ..ObjectMeta::default()
                    },
                    spec: deployment.clone(),
                }),
            },
            topology: Topology {
                pools: vec![pool_entry(&platform_admin.spec.pool_name)],
            },
            revision_history_limit: None,
        },
    );
    yas.metadata.namespace.clone_from(&platform_admin.metadata.namespace);
    yas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::PlatformAdminSpec;

    fn names(pools: &[Pool]) -> Vec<&str> {
        pools.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_pool_entry_selects_node_pool() {
        let pool = pool_entry("hangzhou");
        assert_eq!(pool.replicas, Some(1));
        let requirement = &pool
            .node_selector_term
            .as_ref()
            .and_then(|t| t.match_expressions.as_ref())
            .unwrap()[0];
        assert_eq!(requirement.key, "apps.openyurt.io/nodepool");
        assert_eq!(requirement.operator, "In");
        assert_eq!(requirement.values, Some(vec!["hangzhou".to_string()]));
    }

    #[test]
    fn test_join_twice_yields_one_entry() {
        let mut pools = vec![pool_entry("beijing")];
        assert!(join_pool(&mut pools, "hangzhou"));
        assert!(!join_pool(&mut pools, "hangzhou"));
        assert_eq!(names(&pools), vec!["beijing", "hangzhou"]);
    }

    #[test]
    fn test_leave_keeps_other_pools_in_order() {
        let mut pools = vec![pool_entry("a"), pool_entry("b"), pool_entry("c")];
        assert!(leave_pool(&mut pools, "b"));
        assert_eq!(names(&pools), vec!["a", "c"]);
        assert!(!leave_pool(&mut pools, "b"));
    }

    #[test]
    fn test_leave_ignores_foreign_pool_details() {
        let mut foreign = pool_entry("a");
        foreign.replicas = Some(3);
        let mut pools = vec![foreign.clone(), pool_entry("b")];
        leave_pool(&mut pools, "b");
        assert_eq!(pools, vec![foreign]);
    }

    #[test]
    fn test_new_workload_set_shape() {
        let mut pa = PlatformAdmin::new(
            "edge",
            PlatformAdminSpec {
                version: "v1".to_string(),
                pool_name: "hangzhou".to_string(),
                security: false,
            },
        );
        pa.metadata.namespace = Some("default".to_string());
        let component = Component {
            name: "core-data".to_string(),
            ..Component::default()
        };
        let yas = new_workload_set(&pa, &component, &DeploymentSpec::default());

        assert_eq!(yas.metadata.name.as_deref(), Some("core-data"));
        assert_eq!(yas.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(names(&yas.spec.topology.pools), vec!["hangzhou"]);
        assert_eq!(
            yas.spec.selector.and_then(|s| s.match_labels),
            Some(app_labels("core-data"))
        );
        let template = yas.spec.workload_template.deployment_template.unwrap();
        assert_eq!(template.metadata.labels, Some(app_labels("core-data")));
    }
}
