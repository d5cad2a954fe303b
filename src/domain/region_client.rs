//! Per-region client metadata handed to every connection bound to a region.

use serde::Serialize;

/// Metadata describing how a region's backend is reached.
///
/// Shared read-only (behind an `Arc`) by every connection bound to the
/// region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionClient {
    /// Region name, e.g. `"us-east"`.
    pub region: String,
    /// Backend API address serving this region.
    pub address: String,
}

impl RegionClient {
    /// Creates client metadata for `region` served at `address`.
    #[must_use]
    pub fn new(region: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            address: address.into(),
        }
    }
}
