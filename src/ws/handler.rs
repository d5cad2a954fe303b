//! Axum WebSocket upgrade handler and region routing.

use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use super::action::Action;
use super::connection::Connection;
use super::frame::send_action;
use super::handshake::require_region;
use super::hub::RegionSnapshot;
use crate::app_state::AppState;
use crate::domain::RegionStream;
use crate::error::GatewayError;

/// Where an upgraded socket goes.
#[derive(Debug)]
pub enum Route<'a> {
    /// No region in the path: run the region-selection handshake.
    Handshake,
    /// The region is not in the startup snapshot.
    UnknownRegion,
    /// Known region: serve its event stream.
    Region(&'a RegionStream),
}

/// Resolves a region name against the startup snapshot.
#[must_use]
pub fn route<'a>(regions: &'a RegionSnapshot, region: &str) -> Route<'a> {
    if region.is_empty() {
        return Route::Handshake;
    }
    regions
        .get(region)
        .map_or(Route::UnknownRegion, Route::Region)
}

/// WebSocket routes: `/ws/nomad`, `/ws/nomad/` and `/ws/nomad/{*region}`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ws/nomad", get(handshake_handler))
        .route("/ws/nomad/", get(handshake_handler))
        .route("/ws/nomad/{*region}", get(ws_handler))
}

/// `GET /ws/nomad/<region>` — Upgrade to a region-scoped WebSocket.
///
/// The region is the percent-decoded remainder of the path. The origin
/// policy is checked before upgrading. Routing happens on the upgraded
/// socket: an unknown region receives the unknown-region action followed by
/// a close frame, and a known region becomes a [`Connection`].
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(region): Path<String>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    upgrade_socket(state, region, &headers, upgrade)
}

/// `GET /ws/nomad/` — Upgrade and run the region-selection handshake.
pub async fn handshake_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    upgrade_socket(state, String::new(), &headers, upgrade)
}

fn upgrade_socket(
    state: AppState,
    region: String,
    headers: &HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if let Err(e) = state.origin_policy.check(headers.get(header::ORIGIN)) {
        tracing::warn!(error = %e, "rejecting websocket request");
        return e.into_response();
    }

    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::error!(error = %rejection, "transport: websocket upgrade failed");
            return rejection.into_response();
        }
    };

    ws.on_failed_upgrade(|e| tracing::error!(error = %e, "transport: websocket upgrade failed"))
        .on_upgrade(move |socket| serve_socket(socket, region, state))
}

async fn serve_socket(socket: WebSocket, region: String, state: AppState) {
    let regions = std::sync::Arc::clone(state.hub.regions());
    match route(&regions, &region) {
        Route::Handshake => {
            tracing::warn!("no region provided");
            require_region(socket, &regions).await;
        }
        Route::UnknownRegion => reject_unknown_region(socket, region).await,
        Route::Region(stream) => {
            Connection::new(
                state.hub.clone(),
                socket,
                std::sync::Arc::clone(stream.client()),
                stream.subscribe(),
                state.connection_options,
            )
            .handle()
            .await;
        }
    }
}

/// Sends the unknown-region action, then closes the socket explicitly.
async fn reject_unknown_region(mut socket: WebSocket, region: String) {
    tracing::error!(error = %GatewayError::UnknownRegion(region), "routing failed");
    send_action(&mut socket, &Action::unknown_region()).await;
    let close = Message::Close(Some(CloseFrame {
        code: close_code::POLICY,
        reason: "unknown region".into(),
    }));
    if let Err(e) = socket.send(close).await {
        tracing::debug!(error = %e, "failed to close socket");
    }
}
