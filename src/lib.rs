//! # nomad-gateway
//!
//! Region-scoped WebSocket fan-out gateway for Nomad cluster state.
//!
//! Browser clients connect to `/ws/nomad/<region>` and receive the state
//! updates published for that region. The gateway does not compute or cache
//! cluster state; it only tracks live connections and routes each socket to
//! the right region stream.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS Handler (ws/handler)  ── routing ──┬── Handshake (ws/handshake)
//!     │                                          └── Connection (ws/connection)
//!     ├── REST Handlers (api/)                          │
//!     │                                                 │ register / unregister
//!     ├── Hub (ws/hub)  ◄───────────────────────────────┘
//!     │
//!     └── RegionStreamRegistry (domain/)  ◄── cluster-state publisher
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod ws;
