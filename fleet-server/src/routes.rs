use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use fleet_contracts::{IngestMetricsRequest, RegisterAgentRequest};
use fleet_core::database::ports::AgentRepository;
use fleet_core::gateway::IngestMetricsInput;
use serde_json::json;

use crate::auth::CredentialIssuer;
use crate::errors::AppResult;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .route("/servers/monitoring", post(monitoring_handler))
        .route("/servers/register", post(register_handler))
        .with_state(state)
}

async fn ping_handler() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `POST /servers/monitoring` (spec §6): 200 on accept, 400 on validation,
/// 500 on a transient failure. Safe to retry — the Status Updater consumer
/// is idempotent.
async fn monitoring_handler(
    State(state): State<AppState>,
    Json(request): Json<IngestMetricsRequest>,
) -> AppResult<impl IntoResponse> {
    let input = IngestMetricsInput {
        agent_id: request.agent_id,
        cpu: request.cpu,
        ram: request.ram,
        disk: request.disk,
        timestamp: request.timestamp,
    };
    state.gateway.ingest_metrics(input).await?;
    Ok(StatusCode::OK)
}

/// `POST /servers/register` (spec §6): 201 with credentials, 409 on
/// duplicate `agent_id`.
async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterAgentRequest>,
) -> AppResult<impl IntoResponse> {
    let agent = state.agents.register(request).await?;
    let credentials = state.credential_issuer.issue(&agent.agent_id);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "agent_id": agent.agent_id,
            "credentials": credentials,
        })),
    ))
}
