//! Resolution routes: terms → outcomes → context block → generated query.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use classlens_llm::{LlmTermExtractor, QueryGenerator};
use classlens_resolve::{build_context, ResolvedTerm, TermResolution};
use classlens_store::schema::QUERY_SCHEMA;
use classlens_store::QueryRows;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{api_error, ApiError};
use crate::state::AppState;

const MAX_TERMS_PER_REQUEST: usize = 50;
/// Length cap for a question or a single term.
const MAX_TEXT_CHARS: usize = 2000;
const MAX_RESULT_ROWS: usize = 200;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/resolve", post(resolve_terms))
        .route("/context", post(build_question_context))
        .route("/query", post(generate_query))
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    terms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QuestionRequest {
    question: String,
    /// Run the generated query against the store (query route only).
    #[serde(default = "default_execute")]
    execute: bool,
}

fn default_execute() -> bool {
    true
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveResponse {
    resolutions: Vec<TermResolution>,
    directives: Vec<String>,
    context_block: String,
}

impl ResolveResponse {
    fn new(outcomes: &[(String, ResolvedTerm)]) -> Self {
        let directives = build_context(outcomes);
        Self {
            resolutions: outcomes
                .iter()
                .map(|(term, outcome)| TermResolution::new(term, outcome))
                .collect(),
            context_block: directives.join("\n"),
            directives,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextResponse {
    question: String,
    terms: Vec<String>,
    #[serde(flatten)]
    resolved: ResolveResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(flatten)]
    context: ContextResponse,
    provider: String,
    model: String,
    sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<QueryRows>,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_error: Option<String>,
}

/// POST /api/resolve: resolve an explicit list of terms.
async fn resolve_terms(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    if req.terms.len() > MAX_TERMS_PER_REQUEST {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("at most {} terms per request", MAX_TERMS_PER_REQUEST),
        ));
    }
    if req.terms.iter().any(|t| t.chars().count() > MAX_TEXT_CHARS) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("terms must be at most {} characters", MAX_TEXT_CHARS),
        ));
    }
    let outcomes = state.resolver.resolve_all(&req.terms);
    Ok(Json(ResolveResponse::new(&outcomes)))
}

/// POST /api/context: extract terms from a question and resolve them.
async fn build_question_context(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuestionRequest>,
) -> Result<Json<ContextResponse>, ApiError> {
    let question = validate_question(&req.question)?;
    let extractor = LlmTermExtractor::new(state.llm_client());
    Ok(Json(question_context(&state, &extractor, question).await))
}

/// POST /api/query: context plus an LLM-generated query, optionally run.
async fn generate_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuestionRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let question = validate_question(&req.question)?;
    let client = state.llm_client().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "No LLM provider configured",
        )
    })?;

    let extractor = LlmTermExtractor::new(Some(client.clone()));
    let context = question_context(&state, &extractor, question).await;

    let provider = client.provider().to_string();
    let model = client.model().to_string();
    let generator = QueryGenerator::new(client, QUERY_SCHEMA);
    let sql = generator
        .generate(question, &context.resolved.context_block)
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e))?;

    let (rows, execution_error) = if req.execute {
        match state.store.run_read_query(&sql, MAX_RESULT_ROWS) {
            Ok(rows) => (Some(rows), None),
            Err(e) => {
                warn!("Generated query failed to run: {}", e);
                (None, Some(e.to_string()))
            }
        }
    } else {
        (None, None)
    };

    Ok(Json(QueryResponse {
        context,
        provider,
        model,
        sql,
        rows,
        execution_error,
    }))
}

async fn question_context(
    state: &AppState,
    extractor: &LlmTermExtractor,
    question: &str,
) -> ContextResponse {
    let terms = extractor.extract(question).await;
    let outcomes = state.resolver.resolve_all(&terms);
    let resolved = outcomes.iter().filter(|(_, o)| o.is_resolved()).count();
    info!(
        "Question context: {} terms extracted, {} resolved",
        terms.len(),
        resolved
    );
    ContextResponse {
        question: question.to_string(),
        terms,
        resolved: ResolveResponse::new(&outcomes),
    }
}

fn validate_question(question: &str) -> Result<&str, ApiError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "question is required"));
    }
    if question.chars().count() > MAX_TEXT_CHARS {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("question longer than {} characters", MAX_TEXT_CHARS),
        ));
    }
    Ok(question)
}
