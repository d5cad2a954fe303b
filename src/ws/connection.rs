//! Per-socket connection bound to one region's event stream.
//!
//! A [`Connection`] registers itself with the hub, forwards its region's
//! events to the client through a bounded outbound queue, and unregisters
//! when the socket fails or closes. The hub holds the queue's only strong
//! sender; the connection forwards through a weak one, so the queue closes
//! exactly when the hub drops the connection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use super::action::Action;
use super::frame::{Inbound, SocketSink, encode_frame};
use super::hub::{ConnectionHandle, HubHandle};
use crate::config::{ConnectionOptions, SlowClientPolicy};
use crate::domain::{ConnectionId, RegionClient};

/// Why a connection stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The client closed the socket.
    ClientClosed,
    /// Reading from the socket failed.
    ReadFailed(String),
    /// The write pump exited (write failure).
    WriterStopped,
    /// The outbound queue is gone.
    QueueClosed,
    /// The client fell behind under [`SlowClientPolicy::Disconnect`].
    Lagged(u64),
    /// The region stream was shut down.
    RegionClosed,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => write!(f, "client closed"),
            Self::ReadFailed(e) => write!(f, "read failed: {e}"),
            Self::WriterStopped => write!(f, "writer stopped"),
            Self::QueueClosed => write!(f, "outbound queue closed"),
            Self::Lagged(n) => write!(f, "lagged by {n} events"),
            Self::RegionClosed => write!(f, "region stream closed"),
        }
    }
}

/// One client socket bound to one region.
///
/// The region binding is fixed at construction; switching regions means a
/// new socket and a new `Connection`.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    hub: HubHandle,
    socket: WebSocket,
    client: Arc<RegionClient>,
    events: broadcast::Receiver<Action>,
    options: ConnectionOptions,
}

impl Connection {
    /// Binds an upgraded socket to a region's client metadata and events.
    #[must_use]
    pub fn new(
        hub: HubHandle,
        socket: WebSocket,
        client: Arc<RegionClient>,
        events: broadcast::Receiver<Action>,
        options: ConnectionOptions,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            hub,
            socket,
            client,
            events,
            options,
        }
    }

    /// Runs the connection until the socket closes, then unregisters it.
    pub async fn handle(self) {
        let Self {
            id,
            hub,
            socket,
            client,
            mut events,
            options,
        } = self;
        let region = client.region.as_str();

        let (send, queue) = mpsc::channel(options.queue_capacity.max(1));
        let outbound = send.downgrade();
        if let Err(e) = hub
            .register(ConnectionHandle::new(id, region, send))
            .await
        {
            tracing::error!(connection_id = %id, region, error = %e, "failed to register connection");
            return;
        }
        tracing::info!(connection_id = %id, region, "client connected");

        let (ws_tx, mut ws_rx) = socket.split();
        let mut writer = tokio::spawn(write_pump(id, ws_tx, queue, options.ping_interval));
        let mut writer_done = false;

        let reason = loop {
            tokio::select! {
                frame = ws_rx.next() => match Inbound::from_frame(frame) {
                    Inbound::Action(action) => {
                        tracing::debug!(
                            connection_id = %id,
                            action_type = %action.action_type,
                            "client action received"
                        );
                    }
                    Inbound::Control => {}
                    Inbound::Closed => break Termination::ClientClosed,
                    Inbound::Failed(e) => break Termination::ReadFailed(e.to_string()),
                },
                event = events.recv() => match event {
                    Ok(action) => {
                        let Some(send) = outbound.upgrade() else {
                            break Termination::QueueClosed;
                        };
                        // Waits for queue capacity; a slow client lags on the
                        // region channel instead of growing the queue.
                        if send.send(action).await.is_err() {
                            break Termination::QueueClosed;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(connection_id = %id, region, lagged = n, "client lagged behind region stream");
                        if options.slow_client == SlowClientPolicy::Disconnect {
                            break Termination::Lagged(n);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break Termination::RegionClosed,
                },
                _ = &mut writer, if !writer_done => {
                    writer_done = true;
                    break Termination::WriterStopped;
                }
            }
        };

        tracing::info!(connection_id = %id, region, reason = %reason, "client disconnected");
        hub.unregister(id);

        if !writer_done && let Err(e) = writer.await {
            tracing::error!(connection_id = %id, error = %e, "write pump panicked");
        }
    }
}

/// Drains the outbound queue to the socket and keeps the socket alive.
///
/// Exits when the hub closes the queue (after sending a close frame) or
/// when a write fails.
async fn write_pump(
    id: ConnectionId,
    mut ws_tx: SocketSink,
    mut queue: mpsc::Receiver<Action>,
    ping_interval: Option<Duration>,
) {
    let period = ping_interval.unwrap_or(Duration::from_secs(3600));
    let mut ping = interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            next = queue.recv() => {
                let Some(action) = next else {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    tracing::debug!(connection_id = %id, "outbound queue closed");
                    return;
                };
                let frame = match encode_frame(&action) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(connection_id = %id, error = %e, "dropping unencodable action");
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(frame).await {
                    tracing::debug!(connection_id = %id, error = %e, "write failed");
                    return;
                }
            }
            _ = ping.tick(), if ping_interval.is_some() => {
                if let Err(e) = ws_tx.send(Message::Ping(Bytes::new())).await {
                    tracing::debug!(connection_id = %id, error = %e, "ping failed");
                    return;
                }
            }
        }
    }
}
