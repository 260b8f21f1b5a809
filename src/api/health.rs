//! Health check endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, repository::Store};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current status of the service
    pub status: String,
    /// Version of the service
    pub version: String,
    /// Ledger mode the server runs in
    pub mode: String,
}

fn response(state: &crate::AppState, status: &str) -> HealthResponse {
    HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: state.config.ledger.mode.title().to_string(),
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<crate::AppState>) -> Json<HealthResponse> {
    Json(response(&state, "healthy"))
}

/// Readiness check endpoint (checks the store answers)
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 500, description = "Store unreachable", body = crate::error::ErrorResponse)
    )
)]
pub async fn readiness_check(State(state): State<crate::AppState>) -> AppResult<Json<HealthResponse>> {
    state.services.store.ping().await?;
    Ok(Json(response(&state, "ready")))
}
