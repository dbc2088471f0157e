//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults in [`crate::constants`] and can be overridden via
/// environment variables. The value is built once in `main` and shared by `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Number of concurrent reconcile workers
    pub workers: u16,
    /// Requeue delay while components are still rolling out (seconds)
    pub soft_requeue_secs: u64,
    /// Fibonacci error backoff lower bound (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci error backoff upper bound (seconds)
    pub backoff_max_secs: u64,
    /// Delay before restarting the watch stream after it ends (seconds)
    pub watch_restart_delay_secs: u64,
    /// Location of the component catalog YAML file
    pub catalog_path: PathBuf,
    /// HTTP port for metrics and probes
    pub metrics_port: u16,
    /// How long to wait for the HTTP server to bind (seconds)
    pub server_startup_timeout_secs: u64,
    /// Readiness poll interval while waiting for the HTTP server (milliseconds)
    pub server_poll_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            workers: DEFAULT_WORKERS,
            soft_requeue_secs: DEFAULT_SOFT_REQUEUE_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            catalog_path: PathBuf::from(DEFAULT_COMPONENT_CATALOG_PATH),
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    /// Unparseable values fall back to the default.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        use crate::constants::*;
        let workers = parse_or_default(&lookup, "PLATFORMADMIN_WORKERS", DEFAULT_WORKERS);
        let backoff_min_secs = parse_or_default(&lookup, "BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS);
        let backoff_max_secs = parse_or_default(&lookup, "BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS);
        Self {
            // zero workers would stall the controller
            workers: workers.max(1),
            soft_requeue_secs: parse_or_default(&lookup, "SOFT_REQUEUE_SECS", DEFAULT_SOFT_REQUEUE_SECS),
            backoff_min_secs,
            backoff_max_secs: backoff_max_secs.max(backoff_min_secs),
            watch_restart_delay_secs: parse_or_default(
                &lookup,
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            catalog_path: lookup("COMPONENT_CATALOG_PATH")
                .filter(|v| !v.is_empty())
                .map_or_else(|| PathBuf::from(DEFAULT_COMPONENT_CATALOG_PATH), PathBuf::from),
            metrics_port: parse_or_default(&lookup, "METRICS_PORT", DEFAULT_METRICS_PORT),
            server_startup_timeout_secs: parse_or_default(
                &lookup,
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            server_poll_interval_ms: parse_or_default(
                &lookup,
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
        }
    }

    /// Get the soft requeue duration used while components are not ready
    #[must_use]
    pub fn soft_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.soft_requeue_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    #[must_use]
    pub fn server_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.server_startup_timeout_secs)
    }

    #[must_use]
    pub fn server_poll_interval(&self) -> Duration {
        Duration::from_millis(self.server_poll_interval_ms)
    }
}

/// Read a key and parse it, or return the default value
fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = ControllerConfig::from_lookup(|_| None);
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.workers, 3);
        assert_eq!(config.soft_requeue_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("PLATFORMADMIN_WORKERS", "8"),
            ("SOFT_REQUEUE_SECS", "30"),
            ("COMPONENT_CATALOG_PATH", "/tmp/catalog.yaml"),
            ("METRICS_PORT", "9090"),
        ]));
        assert_eq!(config.workers, 8);
        assert_eq!(config.soft_requeue_secs, 30);
        assert_eq!(config.catalog_path, PathBuf::from("/tmp/catalog.yaml"));
        assert_eq!(config.metrics_port, 9090);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("PLATFORMADMIN_WORKERS", "many"),
            ("METRICS_PORT", "70000"),
        ]));
        assert_eq!(config.workers, 3);
        assert_eq!(config.metrics_port, 8080);
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let config = ControllerConfig::from_lookup(lookup_from(&[("PLATFORMADMIN_WORKERS", "0")]));
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_backoff_max_never_below_min() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("BACKOFF_MIN_SECS", "60"),
            ("BACKOFF_MAX_SECS", "10"),
        ]));
        assert_eq!(config.backoff_min_secs, 60);
        assert_eq!(config.backoff_max_secs, 60);
    }
}
