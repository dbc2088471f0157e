//! # Configuration
//!
//! Process configuration loaded once at startup:
//! - [`ControllerConfig`]: runtime settings from environment variables
//! - [`ComponentCatalog`]: the version-keyed component catalog file

pub mod catalog;
pub mod controller;

pub use catalog::{CatalogError, Component, ComponentCatalog, VersionCatalog};
pub use controller::ControllerConfig;
