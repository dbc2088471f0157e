//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use platform_admin_controller::prelude::*;
//! ```

pub use crate::crd::*;

pub use crate::cluster::{ClusterApi, ClusterError, InMemoryCluster, KubeCluster};

pub use crate::controller::reconciler::{
    reconcile_platform_admin, DesiredState, ReconcileOutcome, Reconciler, ReconcilerError,
    ResolveError,
};

pub use crate::config::{CatalogError, Component, ComponentCatalog, ControllerConfig};
