//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Label, annotation and finalizer keys are part of the contract with other
//! OpenYurt components and must not change. Numeric defaults can be
//! overridden through the environment (see [`crate::config::ControllerConfig`]).

/// Name used for logging, field managers and the HTTP user agent
pub const CONTROLLER_NAME: &str = "PlatformAdmin";

/// Field manager recorded on every write made by the controller
pub const FIELD_MANAGER: &str = "platform-admin-controller";

/// Finalizer placed on every PlatformAdmin until pool memberships are released
pub const PLATFORM_ADMIN_FINALIZER: &str = "iot.openyurt.io";

/// Label marking a child object as generated by this controller.
/// The value is the child kind (see the `LABEL_*` constants below).
pub const LABEL_PLATFORM_ADMIN_GENERATE: &str = "iot.openyurt.io/generate";

/// Generate-label value for ConfigMaps
pub const LABEL_CONFIGMAP: &str = "Configmap";

/// Generate-label value for Services
pub const LABEL_SERVICE: &str = "Service";

/// Generate-label value for YurtAppSets
pub const LABEL_DEPLOYMENT: &str = "Deployment";

/// Node label carrying the node pool a node belongs to
pub const LABEL_CURRENT_NODE_POOL: &str = "apps.openyurt.io/nodepool";

/// Service annotation consumed by the service topology adapter
pub const ANNOTATION_SERVICE_TOPOLOGY_KEY: &str = "openyurt.io/topologyKeys";

/// Topology value routing Service traffic to endpoints in the same node pool
pub const ANNOTATION_SERVICE_TOPOLOGY_VALUE_NODE_POOL: &str = "openyurt.io/nodepool";

/// Annotation holding extra deployment templates (JSON array)
pub const ANNOTATION_ADDITIONAL_DEPLOYMENTS: &str = "AdditionalDeployments";

/// Annotation holding extra service templates (JSON array)
pub const ANNOTATION_ADDITIONAL_SERVICES: &str = "AdditionalServices";

/// Selector label key used for workload-set pods
pub const LABEL_APP: &str = "app";

/// Default number of concurrent reconcile workers
pub const DEFAULT_WORKERS: u16 = 3;

/// Requeue delay used while components are still rolling out (seconds)
pub const DEFAULT_SOFT_REQUEUE_SECS: u64 = 10;

/// Lower bound of the per-resource Fibonacci error backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Upper bound of the per-resource Fibonacci error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default location of the component catalog file
pub const DEFAULT_COMPONENT_CATALOG_PATH: &str = "/etc/platformadmin/catalog.yaml";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
