//! PlatformAdmin Controller Library
//!
//! Reconciles `PlatformAdmin` resources into the ConfigMaps, Services and
//! `YurtAppSet` pool entries of an edge platform running in one node pool.
//!
//! ## Quick Start
//!
//! ```rust
//! use platform_admin_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific
//! imports, use the individual modules.

pub mod cluster;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
