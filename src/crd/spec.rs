//! # PlatformAdmin Spec
//!
//! The parent resource driving reconciliation.

use serde::{Deserialize, Serialize};

/// PlatformAdmin Custom Resource Definition
///
/// A PlatformAdmin deploys one edge platform (a versioned set of components)
/// into a single node pool. Several PlatformAdmins may share the same
/// YurtAppSets; each contributes exactly one pool to their topology.
///
/// # Example
///
/// ```yaml
/// apiVersion: iot.openyurt.io/v1alpha2
/// kind: PlatformAdmin
/// metadata:
///   name: edgex-hangzhou
///   namespace: default
///   annotations:
///     AdditionalDeployments: '[{"metadata":{"name":"extra-svc"},"spec":{...}}]'
/// spec:
///   version: minnesota
///   poolName: hangzhou
///   security: false
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "PlatformAdmin",
    group = "iot.openyurt.io",
    version = "v1alpha2",
    namespaced,
    status = "crate::crd::PlatformAdminStatus",
    shortname = "pa",
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}, {"name":"ReadyComponentNum", "type":"integer", "jsonPath":".status.readyComponentNum"}, {"name":"UnreadyComponentNum", "type":"integer", "jsonPath":".status.unreadyComponentNum"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PlatformAdminSpec {
    /// Platform version; selects the catalog entry
    #[serde(default)]
    pub version: String,
    /// Node pool this platform is deployed into
    #[serde(default)]
    pub pool_name: String,
    /// Selects the security-enabled catalog when true
    #[serde(default)]
    pub security: bool,
}
