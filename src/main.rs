//! nomad-gateway server entry point.
//!
//! Starts the connection hub and the Axum HTTP server with REST and
//! WebSocket endpoints.

use tracing_subscriber::EnvFilter;

use nomad_gateway::config::GatewayConfig;
use nomad_gateway::server::{build_app, build_state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, regions = ?config.regions, "starting nomad-gateway");

    // Build hub and application state
    let (hub, app_state) = build_state(&config).await;
    tokio::spawn(hub.run());

    let app = build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
