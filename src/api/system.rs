use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub ping: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub user_info: bool,
}

/// `GET /ping`, liveness for load balancers.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { ping: "pong" })
}

/// `GET /health`, reachability of the identity service.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        user_info: state.shared.user_client.healthcheck().await,
    })
}

/// Unknown routes answer with the regular JSON error body.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Resource not found".to_string())
}
