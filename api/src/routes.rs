use crate::query_payload::QueryPayload;
use crate::rag_response::{ErrorResponse, RagResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bedrock_rag::{ProviderError, RagAgent, RagError};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// The agent is read-only after startup, so handlers share it without locking.
pub fn router(agent: Arc<RagAgent>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query", post(query))
        .layer(CorsLayer::permissive())
        .with_state(agent)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn query(
    State(agent): State<Arc<RagAgent>>,
    payload: Result<Json<QueryPayload>, JsonRejection>,
) -> Result<Json<RagResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Json(payload) = payload.map_err(|rejection| {
        let err = RagError::Validation(rejection.body_text());
        log::warn!("Rejected query body: {}", err);
        (StatusCode::BAD_REQUEST, Json(ErrorResponse::from(&err)))
    })?;

    match agent.answer(&payload.question).await {
        Ok(answer) => Ok(Json(answer.into())),
        Err(err) => {
            log::error!("Query failed ({}): {}", err.kind(), err);
            Err((status_for(&err), Json(ErrorResponse::from(&err))))
        }
    }
}

fn status_for(err: &RagError) -> StatusCode {
    match err {
        RagError::Validation(_) => StatusCode::BAD_REQUEST,
        RagError::Provider(ProviderError::Throttling(_)) => StatusCode::TOO_MANY_REQUESTS,
        RagError::Provider(ProviderError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        RagError::Provider(_) | RagError::Embedding(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
