//! Domain layer: connection identity and region event streams.

pub mod connection_id;
pub mod region_client;
pub mod region_streams;

pub use connection_id::ConnectionId;
pub use region_client::RegionClient;
pub use region_streams::{RegionStream, RegionStreamRegistry};
