//! System endpoints: health check and region listing.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    connections: usize,
    regions: usize,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health, version, the live WebSocket connection count and the number of regions known at startup.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connections: state.hub.connection_count(),
            regions: state.hub.regions().len(),
        }),
    )
}

/// Region list response.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegionsResponse {
    regions: Vec<String>,
}

/// `GET /api/v1/regions` — Regions clients can connect to.
#[utoipa::path(
    get,
    path = "/api/v1/regions",
    tag = "System",
    summary = "List regions",
    description = "Returns the region names captured at startup, in registry order. Regions registered later are not listed until restart.",
    responses(
        (status = 200, description = "Region catalog", body = RegionsResponse),
    )
)]
pub async fn regions_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(RegionsResponse {
            regions: state.hub.regions().names(),
        }),
    )
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/regions", get(regions_handler))
}
