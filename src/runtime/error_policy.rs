//! # Error Policy
//!
//! Requeue policy for failed reconcile passes. Each PlatformAdmin keeps its
//! own Fibonacci backoff so one failing resource never slows down another.

use crate::cluster::ClusterApi;
use crate::controller::backoff::BackoffState;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::PlatformAdmin;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Fallback delay when the backoff table cannot be locked
const FALLBACK_BACKOFF_SECS: u64 = 60;

/// Next retry delay for a resource, advancing its backoff
pub fn next_backoff<C: ClusterApi>(ctx: &Reconciler<C>, resource_key: &str) -> (Duration, u32) {
    match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key.to_string()).or_insert_with(|| {
                BackoffState::new(ctx.config.backoff_min_secs, ctx.config.backoff_max_secs)
            });
            state.increment_error();
            (state.backoff.next_backoff(), state.error_count)
        }
        Err(e) => {
            warn!(error = %e, "Failed to lock backoff states, using default backoff");
            (Duration::from_secs(FALLBACK_BACKOFF_SECS), 0)
        }
    }
}

/// Handle a failed pass: log, count and schedule the retry
pub fn handle_reconciliation_error<C: ClusterApi>(
    obj: Arc<PlatformAdmin>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler<C>>,
) -> Action {
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let (delay, error_count) = next_backoff(&ctx, &format!("{namespace}/{name}"));

    if error.is_conflict() {
        info!(
            resource.namespace = %namespace,
            resource.name = %name,
            "Conflict while reconciling, retrying in {}s",
            delay.as_secs()
        );
    } else {
        error!(
            resource.namespace = %namespace,
            resource.name = %name,
            error = %error,
            error_count,
            "Reconciliation failed, retrying in {}s",
            delay.as_secs()
        );
    }

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}
