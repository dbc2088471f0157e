//! # PlatformAdmin Status
//!
//! Status types and condition vocabulary.

use serde::{Deserialize, Serialize};

/// ConfigMaps of the selected catalog version are in place
pub const CONFIGMAP_AVAILABLE_CONDITION: &str = "ConfigmapAvailable";
/// Every desired component is deployed and ready in our pool
pub const COMPONENT_AVAILABLE_CONDITION: &str = "ComponentAvailable";

pub const CONFIGMAP_PROVISIONING_REASON: &str = "ConfigmapProvisioning";
pub const CONFIGMAP_PROVISIONING_FAILED_REASON: &str = "ConfigmapProvisioningFailed";
pub const COMPONENT_PROVISIONING_REASON: &str = "ComponentProvisioning";
pub const COMPONENT_PROVISIONING_FAILED_REASON: &str = "ComponentProvisioningFailed";

/// Status of the PlatformAdmin resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformAdminStatus {
    /// Set once the controller has processed the resource at least once
    #[serde(default)]
    pub initialized: bool,
    /// True only when both ConfigmapAvailable and ComponentAvailable are true
    #[serde(default)]
    pub ready: bool,
    /// Number of components whose service and pool are ready
    #[serde(default)]
    pub ready_component_num: i32,
    /// Desired components minus ready components
    #[serde(default)]
    pub unready_component_num: i32,
    /// Latest observations; at most one entry per condition type
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Condition status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

/// Condition represents an observation of one aspect of the PlatformAdmin
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Last time the status value flipped (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    #[must_use]
    pub fn new(r#type: &str, status: ConditionStatus, reason: &str, message: &str) -> Self {
        Self {
            r#type: r#type.to_string(),
            status,
            last_transition_time: None,
            reason: (!reason.is_empty()).then(|| reason.to_string()),
            message: (!message.is_empty()).then(|| message.to_string()),
        }
    }

    #[must_use]
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}
