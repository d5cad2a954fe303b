//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::{ConnectionOptions, OriginPolicy};
use crate::domain::RegionStreamRegistry;
use crate::ws::hub::HubHandle;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the running connection hub.
    pub hub: HubHandle,
    /// Live region registry, published into by the cluster-state side.
    pub registry: Arc<RegionStreamRegistry>,
    /// Origins allowed to open a WebSocket.
    pub origin_policy: OriginPolicy,
    /// Per-connection tuning.
    pub connection_options: ConnectionOptions,
}
