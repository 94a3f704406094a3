//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::time::Instant;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
    pub collaborators: CollaboratorHealth,
}

/// Database health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
    pub pool_size: u32,
    pub idle_connections: usize,
}

/// Which post-commit collaborators are switched on.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CollaboratorHealth {
    pub email: bool,
    pub calendar: bool,
    /// The gateway callback is refused while no secret is configured.
    pub mobile_money_callbacks: bool,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

async fn ping(state: &AppState) -> Option<u64> {
    let start = Instant::now();
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .ok()
        .map(|_| start.elapsed().as_millis() as u64)
}

/// Full health check endpoint.
///
/// GET /api/health
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let latency_ms = ping(&state).await;
    let connected = latency_ms.is_some();

    let response = HealthResponse {
        status: if connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: DatabaseHealth {
            connected,
            latency_ms,
            pool_size: state.pool.size(),
            idle_connections: state.pool.num_idle(),
        },
        collaborators: CollaboratorHealth {
            email: state.config.email.enabled,
            calendar: state.config.calendar.enabled,
            mobile_money_callbacks: !state.config.mobile_money.callback_secret.is_empty(),
        },
    };

    if connected {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Liveness probe endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 OK if the service can accept traffic (database connected).
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    if ping(&state).await.is_some() {
        Ok(Json(StatusResponse {
            status: "ready".to_string(),
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
