//! Wiring: region registry, hub and router construction.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::domain::{RegionClient, RegionStreamRegistry};
use crate::ws::handler;
use crate::ws::hub::Hub;

/// Registers the configured regions and builds the hub over them.
///
/// The returned [`Hub`] must be driven with [`Hub::run`] for WebSocket
/// clients to be served.
pub async fn build_state(config: &GatewayConfig) -> (Hub, AppState) {
    let registry = Arc::new(RegionStreamRegistry::new(config.region_channel_capacity));
    for region in &config.regions {
        registry
            .insert(RegionClient::new(region.as_str(), config.nomad_addr.as_str()))
            .await;
    }

    let (hub, handle) = Hub::new(&registry).await;
    let state = AppState {
        hub: handle,
        registry,
        origin_policy: config.origin_policy.clone(),
        connection_options: config.connection_options(),
    };
    (hub, state)
}

/// Builds the full application router: REST, WebSocket and docs.
pub fn build_app(state: AppState) -> Router {
    let router = Router::new()
        .merge(api::build_router())
        .merge(handler::routes());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
