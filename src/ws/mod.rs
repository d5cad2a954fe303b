//! WebSocket layer: action codec, connection hub, routing and handshake.
//!
//! Clients connect to `/ws/nomad/<region>` and receive that region's
//! state updates. Clients that connect without a region are walked
//! through the region-selection handshake instead.

pub mod action;
pub mod connection;
pub mod frame;
pub mod handler;
pub mod handshake;
pub mod hub;
