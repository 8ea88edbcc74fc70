//! LLM provider configuration routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use classlens_core::Error;
use classlens_llm::{LLMConfigResponse, LLMConfigUpdate};
use tracing::info;

use super::{api_error, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/llm/config", get(get_config).put(update_config))
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<LLMConfigResponse> {
    Json(state.llm_config.read().to_response())
}

async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<LLMConfigUpdate>,
) -> Result<Json<LLMConfigResponse>, ApiError> {
    let mut config = state.llm_config.write();
    let mut updated = config.clone();
    updated.apply_update(&update).map_err(|e| match e {
        Error::InvalidInput(_) => api_error(StatusCode::BAD_REQUEST, e),
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other),
    })?;
    updated.save().map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to save config: {}", e),
        )
    })?;

    *config = updated;
    info!("LLM config updated; active provider: {:?}", config.to_response().active_provider);
    Ok(Json(config.to_response()))
}
