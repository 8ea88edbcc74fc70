//! Health and stats routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use super::{api_error, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(get_health))
        .route("/stats", get(get_stats))
}

/// GET /api/health: liveness plus index readiness.
async fn get_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let generation = state.resolver.generation();
    Json(serde_json::json!({
        "status": "ok",
        "indexesReady": generation > 0,
        "generation": generation,
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/stats: store counts, index sizes and the last refresh.
async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store_stats = state
        .store
        .get_stats()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    Ok(Json(serde_json::json!({
        "store": store_stats,
        "indexSizes": state.resolver.index_sizes(),
        "generation": state.resolver.generation(),
        "lastRefresh": state.resolver.last_report(),
        "policy": state.resolver.policy(),
    })))
}
