//! Manual index rebuild.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use classlens_resolve::RefreshReport;

use super::{api_error, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/refresh", post(refresh))
}

/// POST /api/refresh: rebuild every category index from the store.
async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<RefreshReport>, ApiError> {
    crate::refresh::refresh_indexes(&state)
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
}
