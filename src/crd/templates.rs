//! # Workload Templates
//!
//! Named Deployment and Service templates. They appear inside YurtAppSets
//! and in the PlatformAdmin override annotations, where the name in
//! `metadata.name` becomes the component name.

use k8s_openapi::api::apps::v1::DeploymentSpec;
use k8s_openapi::api::core::v1::ServiceSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Deployment template: object metadata plus a DeploymentSpec
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct DeploymentTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: DeploymentSpec,
}

/// Service template: object metadata plus a ServiceSpec
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct ServiceTemplateSpec {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: ServiceSpec,
}
