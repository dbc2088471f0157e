//! # Reconciler
//!
//! Drives PlatformAdmin resources toward their desired state.
//!
//! ## Reconciliation Flow
//!
//! 1. Resolve the desired components from the catalog and the override annotations
//! 2. Upsert config objects, services and workload-set pool entries
//! 3. Release children that are no longer desired
//! 4. Aggregate conditions into the status
//!
//! Deleting parents withdraw their pool from every workload-set before the
//! finalizer is removed.

pub mod deletion;
pub mod gc;
pub mod ownership;
pub mod pool;
pub mod reconcile;
pub mod resolve;
pub mod status;
pub mod sync;
pub mod types;

pub use reconcile::reconcile_platform_admin;
pub use resolve::{resolve, DesiredState, ResolveError};
pub use types::{ReconcileOutcome, Reconciler, ReconcilerError};
