//! Startup and periodic catalog indexing.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use storage::ReindexReport;
use tile_common::TileResult;

use crate::metrics;
use crate::state::AppState;

/// Run one sweep and drop cached handles for files that changed or vanished.
///
/// Sweeps are serialised; a sweep requested while another runs waits for it.
pub async fn run_sweep(state: &AppState) -> TileResult<ReindexReport> {
    let _guard = state.sweep_lock.lock().await;

    let result = if state.config.reconcile_on_reindex {
        state.indexer.reindex_and_reconcile().await
    } else {
        state.indexer.reindex().await
    };

    match result {
        Ok(report) => {
            for path in report.updated_paths.iter().chain(&report.removed_paths) {
                state.cache.invalidate(path);
            }
            if report.removed > 0 {
                info!(removed = report.removed, "Purged records of deleted files");
            }
            metrics::record_reindex(&report);
            Ok(report)
        }
        Err(e) => {
            error!(error = %e, "Indexing sweep failed; serving the existing catalog");
            metrics::record_reindex_failure();
            Err(e)
        }
    }
}

/// Spawn the periodic sweep, or nothing when the interval is disabled.
///
/// The first tick is skipped because startup already ran a sweep.
pub fn spawn_periodic_reindex(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let interval = state.config.reindex_interval()?;
    info!(interval_secs = interval.as_secs(), "Periodic reindex enabled");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            // Failures are logged inside; the next tick retries
            let _ = run_sweep(&state).await;
        }
    }))
}
