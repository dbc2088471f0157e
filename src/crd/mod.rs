//! # Custom Resource Definitions
//!
//! CRD types used by the PlatformAdmin controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `PlatformAdmin` spec (the parent resource)
//! - `status.rs` - `PlatformAdmin` status and conditions
//! - `yurt_app_set.rs` - `YurtAppSet`, the shared multi-pool workload set
//! - `templates.rs` - Deployment/Service templates carried in override annotations

mod spec;
mod status;
mod templates;
mod yurt_app_set;

// Re-export all public types
pub use spec::{PlatformAdmin, PlatformAdminSpec};
pub use status::{
    Condition, ConditionStatus, PlatformAdminStatus, COMPONENT_AVAILABLE_CONDITION,
    COMPONENT_PROVISIONING_FAILED_REASON, COMPONENT_PROVISIONING_REASON,
    CONFIGMAP_AVAILABLE_CONDITION, CONFIGMAP_PROVISIONING_FAILED_REASON,
    CONFIGMAP_PROVISIONING_REASON,
};
pub use templates::{DeploymentTemplateSpec, ServiceTemplateSpec};
pub use yurt_app_set::{
    Pool, Topology, WorkloadTemplate, YurtAppSet, YurtAppSetSpec, YurtAppSetStatus,
};
