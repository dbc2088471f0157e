//! # Runtime
//!
//! Process bootstrap, the controller watch loop and its error policy.

pub mod discovery;
pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::{idle_until_shutdown, run_watch_loop};
