//! Index refresh triggers: warm-up at startup, on demand, and on a timer.
//!
//! Rebuilds read the whole catalog from SQLite, so they run on the blocking
//! pool. The resolution service serializes concurrent rebuilds itself.

use std::sync::Arc;
use std::time::Duration;

use classlens_resolve::RefreshReport;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::state::AppState;

/// Build the initial indexes.
pub async fn warm_up(state: &Arc<AppState>) -> Result<RefreshReport, JoinError> {
    let store = state.store.clone();
    let resolver = state.resolver.clone();
    let report = tokio::task::spawn_blocking(move || resolver.warm_up(&*store)).await?;
    log_report(&report);
    Ok(report)
}

/// Run warm-up in the background so the listener can bind at once.
///
/// Requests that arrive first resolve against whichever categories have
/// been published; `/api/health` reports `indexesReady` once it finishes.
pub fn spawn_warm_up(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = warm_up(&state).await {
            error!("Index warm-up task failed: {}", e);
        }
    })
}

/// Rebuild every index from the store.
pub async fn refresh_indexes(state: &Arc<AppState>) -> Result<RefreshReport, JoinError> {
    let store = state.store.clone();
    let resolver = state.resolver.clone();
    let report = tokio::task::spawn_blocking(move || resolver.refresh(&*store)).await?;
    log_report(&report);
    Ok(report)
}

/// Start the periodic rebuild task if an interval is configured.
pub fn start_refresh_timer(state: Arc<AppState>) {
    let Some(secs) = state.config.refresh_interval_secs else {
        return;
    };

    tokio::spawn(async move {
        info!("Periodic index refresh every {}s", secs);
        let mut ticker = tokio::time::interval(Duration::from_secs(secs));
        // The first tick completes immediately; warm-up covers it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = refresh_indexes(&state).await {
                error!("Index refresh task failed: {}", e);
            }
        }
    });
}

fn log_report(report: &RefreshReport) {
    let failed: Vec<String> = report.failed().map(|c| c.to_string()).collect();
    if failed.is_empty() {
        info!(
            "Index generation {} built in {}ms",
            report.generation, report.duration_ms
        );
    } else {
        warn!(
            "Index generation {} built in {}ms; kept previous indexes for: {}",
            report.generation,
            report.duration_ms,
            failed.join(", ")
        );
    }
}
