//! Connection hub: the single owner of the live-connection set.
//!
//! [`Hub::run`] is an actor. It owns the connection map privately and is
//! reached only through two command channels, register and unregister,
//! exposed by the cloneable [`HubHandle`]. Every mutation of the map
//! happens inside the run loop, one command at a time, so no lock guards it.
//!
//! A connection's outbound queue is closed by dropping the one strong
//! [`mpsc::Sender`] stored in its [`ConnectionHandle`]. The connection
//! itself keeps only a weak sender, which means the hub removing the
//! handle is the only thing that can close the queue, and removal happens
//! at most once.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use super::action::Action;
use crate::domain::{ConnectionId, RegionStream, RegionStreamRegistry};
use crate::error::GatewayError;

/// Hub-side record of one registered connection.
///
/// Deliberately not `Clone`: it carries the only strong sender of the
/// connection's outbound queue.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    region: String,
    send: mpsc::Sender<Action>,
}

impl ConnectionHandle {
    /// Wraps the strong sender of a connection's outbound queue.
    #[must_use]
    pub fn new(id: ConnectionId, region: impl Into<String>, send: mpsc::Sender<Action>) -> Self {
        Self {
            id,
            region: region.into(),
            send,
        }
    }

    /// Connection identity.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Region the connection is bound to.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Region names and streams captured once when the hub is built.
///
/// Regions added to the [`RegionStreamRegistry`] afterwards are not visible
/// here until the process restarts.
#[derive(Debug, Default)]
pub struct RegionSnapshot {
    entries: Vec<(String, RegionStream)>,
}

impl RegionSnapshot {
    /// Captures the registry's current regions in registry order.
    pub async fn capture(registry: &RegionStreamRegistry) -> Self {
        Self {
            entries: registry.entries().await,
        }
    }

    /// Region names in snapshot order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Looks up a region captured in the snapshot.
    #[must_use]
    pub fn get(&self, region: &str) -> Option<&RegionStream> {
        self.entries
            .iter()
            .find(|(name, _)| name == region)
            .map(|(_, stream)| stream)
    }

    /// Number of captured regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no region was known at startup.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Registration {
    handle: ConnectionHandle,
    done: oneshot::Sender<()>,
}

/// Cloneable entry point to a running [`Hub`].
#[derive(Debug, Clone)]
pub struct HubHandle {
    register: mpsc::UnboundedSender<Registration>,
    unregister: mpsc::UnboundedSender<ConnectionId>,
    count: watch::Receiver<usize>,
    regions: Arc<RegionSnapshot>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.handle.id)
            .finish_non_exhaustive()
    }
}

impl HubHandle {
    /// Registers a connection and waits until the run loop has stored it.
    ///
    /// Waiting keeps a connection's register strictly ahead of its own
    /// unregister even though the two travel on different channels.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::HubUnavailable`] if the run loop has stopped.
    pub async fn register(&self, handle: ConnectionHandle) -> Result<(), GatewayError> {
        let (done, stored) = oneshot::channel();
        self.register
            .send(Registration { handle, done })
            .map_err(|_| GatewayError::HubUnavailable)?;
        stored.await.map_err(|_| GatewayError::HubUnavailable)
    }

    /// Asks the run loop to drop a connection and close its outbound queue.
    ///
    /// Unknown ids are ignored by the hub.
    pub fn unregister(&self, id: ConnectionId) {
        if self.unregister.send(id).is_err() {
            tracing::warn!(connection_id = %id, "hub stopped before unregister");
        }
    }

    /// Number of live connections as of the last processed command.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        *self.count.borrow()
    }

    /// Subscribes to live-connection count changes.
    #[must_use]
    pub fn watch_count(&self) -> watch::Receiver<usize> {
        self.count.clone()
    }

    /// The startup region snapshot.
    #[must_use]
    pub fn regions(&self) -> &Arc<RegionSnapshot> {
        &self.regions
    }
}

/// Process-wide registry of live WebSocket connections.
#[derive(Debug)]
pub struct Hub {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    regions: Arc<RegionSnapshot>,
    register: mpsc::UnboundedReceiver<Registration>,
    unregister: mpsc::UnboundedReceiver<ConnectionId>,
    count: watch::Sender<usize>,
}

impl Hub {
    /// Snapshots the registry's regions and creates an empty hub.
    ///
    /// The returned [`HubHandle`] is the only way to reach the hub once
    /// [`Hub::run`] has taken ownership of it.
    pub async fn new(registry: &RegionStreamRegistry) -> (Self, HubHandle) {
        let regions = Arc::new(RegionSnapshot::capture(registry).await);
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = watch::channel(0);

        tracing::info!(regions = ?regions.names(), "connection hub created");

        let hub = Self {
            connections: HashMap::new(),
            regions: Arc::clone(&regions),
            register: register_rx,
            unregister: unregister_rx,
            count: count_tx,
        };
        let handle = HubHandle {
            register: register_tx,
            unregister: unregister_tx,
            count: count_rx,
            regions,
        };
        (hub, handle)
    }

    /// The startup region snapshot.
    #[must_use]
    pub fn regions(&self) -> &Arc<RegionSnapshot> {
        &self.regions
    }

    /// Processes register and unregister commands one at a time.
    ///
    /// Returns only once every [`HubHandle`] has been dropped, which does
    /// not happen while the server holds one in its state.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(Registration { handle, done }) = self.register.recv() => {
                    self.add(handle);
                    self.publish_count();
                    // The registering connection may have given up waiting.
                    let _ = done.send(());
                }
                Some(id) = self.unregister.recv() => {
                    self.remove(id);
                    self.publish_count();
                }
                else => break,
            }
        }
        tracing::info!("connection hub stopped");
    }

    fn add(&mut self, handle: ConnectionHandle) {
        let id = handle.id;
        if handle.send.is_closed() {
            tracing::debug!(connection_id = %id, "connection gone before registration");
            return;
        }
        tracing::debug!(connection_id = %id, region = %handle.region, "connection registered");
        if let Some(previous) = self.connections.insert(id, handle) {
            tracing::warn!(connection_id = %previous.id, "connection registered twice");
        }
    }

    fn remove(&mut self, id: ConnectionId) {
        // Dropping the handle drops the only strong sender, closing the queue.
        if let Some(handle) = self.connections.remove(&id) {
            tracing::debug!(connection_id = %id, region = %handle.region, "connection unregistered");
            drop(handle);
        }
    }

    fn publish_count(&self) {
        self.count.send_replace(self.connections.len());
    }

    #[cfg(test)]
    fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;

    use tokio_test::{assert_pending, task};

    use super::*;
    use crate::domain::RegionClient;

    fn connection(region: &str) -> (ConnectionHandle, mpsc::Receiver<Action>) {
        let (tx, rx) = mpsc::channel(8);
        (ConnectionHandle::new(ConnectionId::new(), region, tx), rx)
    }

    async fn empty_hub() -> (Hub, HubHandle) {
        Hub::new(&RegionStreamRegistry::new(8)).await
    }

    #[tokio::test]
    async fn final_set_matches_registered_minus_unregistered() {
        let (mut hub, _handle) = empty_hub().await;
        let mut receivers = Vec::new();
        let mut ids = Vec::new();
        for _ in 0..6 {
            let (conn, rx) = connection("global");
            ids.push(conn.id());
            hub.add(conn);
            receivers.push(rx);
        }

        let removed: HashSet<ConnectionId> = ids.iter().copied().step_by(2).collect();
        // Unregister in reverse order, with a stranger in between.
        for id in ids.iter().rev().filter(|id| removed.contains(*id)) {
            hub.remove(*id);
            hub.remove(ConnectionId::new());
        }

        for id in &ids {
            assert_eq!(hub.contains(*id), !removed.contains(id));
        }
        assert_eq!(hub.connections.len(), ids.len() - removed.len());
    }

    #[tokio::test]
    async fn unregister_unknown_is_noop() {
        let (mut hub, _handle) = empty_hub().await;
        let (conn, mut rx) = connection("global");
        let id = conn.id();
        hub.add(conn);

        hub.remove(ConnectionId::new());

        assert!(hub.contains(id));
        assert!(rx.try_recv().is_err());
        assert!(!rx.is_closed());
    }

    #[tokio::test]
    async fn unregister_closes_queue_once() {
        let (mut hub, _handle) = empty_hub().await;
        let (conn, mut rx) = connection("global");
        let id = conn.id();
        hub.add(conn);

        hub.remove(id);
        assert!(rx.recv().await.is_none());

        hub.remove(id);
        hub.remove(id);
        assert!(!hub.contains(id));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn queued_actions_drain_before_close() {
        let (mut hub, _handle) = empty_hub().await;
        let (tx, mut rx) = mpsc::channel(8);
        let id = ConnectionId::new();
        let weak = tx.downgrade();
        hub.add(ConnectionHandle::new(id, "global", tx));

        let Some(strong) = weak.upgrade() else {
            panic!("hub should keep the queue open");
        };
        let Ok(()) = strong.send(Action::set_region("global")).await else {
            panic!("send failed");
        };
        drop(strong);

        hub.remove(id);
        assert!(weak.upgrade().is_none());
        assert_eq!(rx.recv().await, Some(Action::set_region("global")));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn run_loop_processes_commands_through_handle() {
        let (hub, handle) = empty_hub().await;
        let runner = tokio::spawn(hub.run());

        let (conn_a, mut rx_a) = connection("global");
        let (conn_b, _rx_b) = connection("global");
        let id_a = conn_a.id();

        let Ok(()) = handle.register(conn_a).await else {
            panic!("register failed");
        };
        let Ok(()) = handle.register(conn_b).await else {
            panic!("register failed");
        };
        assert_eq!(handle.connection_count(), 2);

        let mut count = handle.watch_count();
        handle.unregister(id_a);
        handle.unregister(id_a);
        let Ok(_) = count.wait_for(|n| *n == 1).await else {
            panic!("count watch closed");
        };
        assert!(rx_a.recv().await.is_none());

        drop(count);
        drop(handle);
        let Ok(()) = runner.await else {
            panic!("run loop panicked");
        };
    }

    #[tokio::test]
    async fn register_after_stop_reports_unavailable() {
        let (hub, handle) = empty_hub().await;
        drop(hub);
        let (conn, _rx) = connection("global");
        assert!(matches!(
            handle.register(conn).await,
            Err(GatewayError::HubUnavailable)
        ));
    }

    #[tokio::test]
    async fn idle_run_loop_stays_parked() {
        let (hub, _handle) = empty_hub().await;
        let mut run = task::spawn(hub.run());
        assert_pending!(run.poll());
        assert_pending!(run.poll());
    }

    #[tokio::test]
    async fn snapshot_ignores_regions_added_later() {
        let registry = RegionStreamRegistry::new(8);
        registry.insert(RegionClient::new("us-east", "http://a")).await;
        let (hub, handle) = Hub::new(&registry).await;

        registry.insert(RegionClient::new("eu-west", "http://b")).await;

        assert_eq!(hub.regions().names(), ["us-east"]);
        assert!(handle.regions().get("eu-west").is_none());
        assert!(handle.regions().get("us-east").is_some());
        assert_eq!(registry.len().await, 2);
    }
}
