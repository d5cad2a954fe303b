//! Region-selection handshake for sockets opened without a region.
//!
//! The handshake never accepts a region inline. It prompts the client with
//! the region choice and keeps re-sending the same prompt for every message
//! it receives, until the socket fails or closes. A client that has picked
//! a region reconnects to `/ws/nomad/<region>`.

use axum::extract::ws::WebSocket;
use futures_util::StreamExt;

use super::action::Action;
use super::frame::{Inbound, send_action};
use super::hub::RegionSnapshot;

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Prompt sent; waiting for the client to reconnect with a region.
    AwaitingSelection,
    /// The socket failed or closed.
    Terminated,
}

impl HandshakeState {
    /// Next state after one inbound frame.
    ///
    /// Valid input never advances the handshake; only transport failure
    /// ends it.
    #[must_use]
    pub fn on_inbound(self, inbound: &Inbound) -> Self {
        match (self, inbound) {
            (Self::Terminated, _) | (_, Inbound::Closed | Inbound::Failed(_)) => Self::Terminated,
            (Self::AwaitingSelection, Inbound::Action(_) | Inbound::Control) => {
                Self::AwaitingSelection
            }
        }
    }
}

/// The prompt a region-less client receives.
///
/// With exactly one known region the client is told to adopt it; otherwise
/// (none or several) it is offered the full list.
#[must_use]
pub fn selection_prompt(regions: &RegionSnapshot) -> Action {
    let mut names = regions.names();
    if names.len() == 1
        && let Some(only) = names.pop()
    {
        return Action::set_region(only);
    }
    Action::fetched_regions(names)
}

/// Runs the handshake on a freshly upgraded socket until it terminates.
pub async fn require_region(mut socket: WebSocket, regions: &RegionSnapshot) {
    let prompt = selection_prompt(regions);
    send_action(&mut socket, &prompt).await;

    let mut state = HandshakeState::AwaitingSelection;
    while state == HandshakeState::AwaitingSelection {
        let inbound = Inbound::from_frame(socket.next().await);
        state = state.on_inbound(&inbound);
        match inbound {
            Inbound::Action(action) => {
                tracing::warn!(
                    action_type = %action.action_type,
                    "ignoring unhandled message (missing region)"
                );
                tracing::debug!("asking client to select a region again");
                send_action(&mut socket, &prompt).await;
            }
            Inbound::Failed(e) => tracing::debug!(error = %e, "handshake terminated"),
            Inbound::Closed => tracing::debug!("handshake socket closed"),
            Inbound::Control => {}
        }
    }
}
