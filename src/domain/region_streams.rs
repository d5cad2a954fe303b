//! Per-region broadcast channels for cluster state updates.
//!
//! [`RegionStreamRegistry`] maps each region name to a [`RegionStream`]: a
//! [`tokio::sync::broadcast`] channel of [`Action`]s plus the region's
//! [`RegionClient`] metadata. The cluster-state side publishes into a region
//! and every WebSocket connection bound to that region holds its own
//! receiver, so each channel is the fan-out point for one region.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};

use super::RegionClient;
use crate::ws::action::Action;

/// Event channel and client metadata for one region.
///
/// Cheap to clone: both fields are reference-counted handles.
#[derive(Debug, Clone)]
pub struct RegionStream {
    client: Arc<RegionClient>,
    sender: broadcast::Sender<Action>,
}

impl RegionStream {
    fn new(client: RegionClient, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            client: Arc::new(client),
            sender,
        }
    }

    /// Returns the region's client metadata.
    #[must_use]
    pub fn client(&self) -> &Arc<RegionClient> {
        &self.client
    }

    /// Creates a receiver for all events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Action> {
        self.sender.subscribe()
    }

    /// Publishes an event to every subscriber of this region.
    ///
    /// Returns the number of receivers reached; `0` when nobody listens.
    pub fn publish(&self, action: Action) -> usize {
        self.sender.send(action).unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct Regions {
    order: Vec<String>,
    streams: HashMap<String, RegionStream>,
}

/// Registry of all known region streams.
///
/// Region names are enumerated in insertion order.
#[derive(Debug)]
pub struct RegionStreamRegistry {
    regions: RwLock<Regions>,
    capacity: usize,
}

impl RegionStreamRegistry {
    /// Creates an empty registry whose channels hold `capacity` events each.
    ///
    /// A `capacity` of zero is raised to one, the broadcast minimum.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            regions: RwLock::new(Regions::default()),
            capacity: capacity.max(1),
        }
    }

    /// Registers a region, creating its broadcast channel.
    ///
    /// Inserting a name that already exists keeps the existing channel (so
    /// live receivers stay attached) and returns it unchanged.
    pub async fn insert(&self, client: RegionClient) -> RegionStream {
        let mut regions = self.regions.write().await;
        if let Some(existing) = regions.streams.get(&client.region) {
            return existing.clone();
        }
        let name = client.region.clone();
        let stream = RegionStream::new(client, self.capacity);
        regions.order.push(name.clone());
        regions.streams.insert(name, stream.clone());
        tracing::debug!(region = %stream.client().region, "region stream registered");
        stream
    }

    /// Looks up a region by name.
    pub async fn get(&self, region: &str) -> Option<RegionStream> {
        self.regions.read().await.streams.get(region).cloned()
    }

    /// Returns every region name in insertion order.
    pub async fn names(&self) -> Vec<String> {
        self.regions.read().await.order.clone()
    }

    /// Returns `(name, stream)` pairs in insertion order.
    pub async fn entries(&self) -> Vec<(String, RegionStream)> {
        let regions = self.regions.read().await;
        regions
            .order
            .iter()
            .filter_map(|name| {
                regions
                    .streams
                    .get(name)
                    .map(|stream| (name.clone(), stream.clone()))
            })
            .collect()
    }

    /// Publishes an event into a region.
    ///
    /// Returns the number of receivers reached; `0` for an unknown region.
    pub async fn publish(&self, region: &str, action: Action) -> usize {
        match self.get(region).await {
            Some(stream) => stream.publish(action),
            None => {
                tracing::warn!(region, "dropping event for unknown region");
                0
            }
        }
    }

    /// Returns the number of registered regions.
    pub async fn len(&self) -> usize {
        self.regions.read().await.order.len()
    }

    /// Returns `true` if no region is registered.
    pub async fn is_empty(&self) -> bool {
        self.regions.read().await.order.is_empty()
    }
}
