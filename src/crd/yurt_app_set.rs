//! # YurtAppSet
//!
//! Workload set spanning several node pools. The controller creates one per
//! component and contributes a single pool entry per PlatformAdmin.
//!
//! Only the fields the controller reads or writes are modelled. The `patch`
//! field of a pool is kept as raw JSON.

use crate::crd::DeploymentTemplateSpec;
use k8s_openapi::api::core::v1::{NodeSelectorTerm, Toleration};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use schemars::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "YurtAppSet",
    group = "apps.openyurt.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::YurtAppSetStatus",
    shortname = "yas",
    printcolumn = r#"{"name":"Ready", "type":"integer", "jsonPath":".status.readyReplicas"}, {"name":"Workload", "type":"string", "jsonPath":".status.templateType"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct YurtAppSetSpec {
    /// Label selector for pods; must match the workload template labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    #[serde(default)]
    pub workload_template: WorkloadTemplate,
    #[serde(default)]
    pub topology: Topology,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_history_limit: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_template: Option<DeploymentTemplateSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    #[serde(default)]
    pub pools: Vec<Pool>,
}

/// One node pool of a YurtAppSet topology
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector_term: Option<NodeSelectorTerm>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Per-pool strategic patch applied to the template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub patch: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct YurtAppSetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
    /// Replica count per pool name
    #[serde(default)]
    pub pool_replicas: BTreeMap<String, i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_revision: Option<String>,
}

impl YurtAppSet {
    /// Position of the named pool in the topology
    #[must_use]
    pub fn pool_index(&self, pool_name: &str) -> Option<usize> {
        self.spec
            .topology
            .pools
            .iter()
            .position(|p| p.name == pool_name)
    }

    /// True when the named pool has reported replicas and every replica is ready
    #[must_use]
    pub fn is_pool_ready(&self, pool_name: &str) -> bool {
        self.status.as_ref().is_some_and(|s| {
            s.pool_replicas.contains_key(pool_name) && s.ready_replicas == s.replicas
        })
    }
}

fn preserve_unknown_fields(_: &mut schemars::SchemaGenerator) -> Schema {
    schemars::json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true,
        "nullable": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yas_with_status(status: Option<YurtAppSetStatus>) -> YurtAppSet {
        let mut yas = YurtAppSet::new(
            "edgex-core-data",
            YurtAppSetSpec {
                topology: Topology {
                    pools: vec![
                        Pool {
                            name: "hangzhou".to_string(),
                            ..Pool::default()
                        },
                        Pool {
                            name: "beijing".to_string(),
                            ..Pool::default()
                        },
                    ],
                },
                ..YurtAppSetSpec::default()
            },
        );
        yas.status = status;
        yas
    }

    #[test]
    fn test_pool_index() {
        let yas = yas_with_status(None);
        assert_eq!(yas.pool_index("hangzhou"), Some(0));
        assert_eq!(yas.pool_index("beijing"), Some(1));
        assert_eq!(yas.pool_index("shanghai"), None);
    }

    #[test]
    fn test_pool_ready_requires_status() {
        assert!(!yas_with_status(None).is_pool_ready("hangzhou"));
    }

    #[test]
    fn test_pool_ready_requires_pool_replicas_entry() {
        let yas = yas_with_status(Some(YurtAppSetStatus {
            replicas: 1,
            ready_replicas: 1,
            pool_replicas: BTreeMap::from([("beijing".to_string(), 1)]),
            ..YurtAppSetStatus::default()
        }));
        assert!(yas.is_pool_ready("beijing"));
        assert!(!yas.is_pool_ready("hangzhou"));
    }

    #[test]
    fn test_pool_not_ready_while_rolling_out() {
        let yas = yas_with_status(Some(YurtAppSetStatus {
            replicas: 2,
            ready_replicas: 1,
            pool_replicas: BTreeMap::from([
                ("beijing".to_string(), 1),
                ("hangzhou".to_string(), 1),
            ]),
            ..YurtAppSetStatus::default()
        }));
        assert!(!yas.is_pool_ready("hangzhou"));
    }

    #[test]
    fn test_pool_patch_is_preserved() {
        let json = serde_json::json!({
            "name": "hangzhou",
            "replicas": 1,
            "patch": {"spec": {"template": {"spec": {"hostNetwork": true}}}}
        });
        let pool: Pool = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(serde_json::to_value(&pool).unwrap(), json);
    }
}
