//! REST API layer: system endpoints and OpenAPI document.

pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::error::{ErrorBody, ErrorResponse};

/// OpenAPI document for the REST endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    paths(handlers::system::health_handler, handlers::system::regions_handler),
    components(schemas(
        handlers::system::HealthResponse,
        handlers::system::RegionsResponse,
        ErrorResponse,
        ErrorBody
    )),
    tags((name = "System", description = "Health and region catalog"))
)]
pub struct ApiDoc;

/// Builds the complete REST router.
pub fn build_router() -> Router<AppState> {
    Router::new().merge(handlers::system::routes())
}
