//! Mapping between WebSocket frames and [`Action`]s.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;

use super::action::Action;
use crate::error::GatewayError;

/// What a single inbound frame amounts to.
#[derive(Debug)]
pub enum Inbound {
    /// A decoded action envelope.
    Action(Action),
    /// Ping or pong; answered by the WebSocket layer, carries no action.
    Control,
    /// The peer closed the socket or the stream ended.
    Closed,
    /// A read error or an undecodable data frame.
    Failed(GatewayError),
}

impl Inbound {
    /// Classifies the result of one `next()` on a WebSocket stream.
    ///
    /// Text and binary frames are both decoded as JSON envelopes.
    #[must_use]
    pub fn from_frame(frame: Option<Result<Message, axum::Error>>) -> Self {
        match frame {
            None | Some(Ok(Message::Close(_))) => Self::Closed,
            Some(Err(e)) => Self::Failed(GatewayError::Transport(e)),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => Self::Control,
            Some(Ok(Message::Text(text))) => match Action::decode(text.as_str()) {
                Ok(action) => Self::Action(action),
                Err(e) => Self::Failed(e.into()),
            },
            Some(Ok(Message::Binary(bytes))) => match serde_json::from_slice(&bytes) {
                Ok(action) => Self::Action(action),
                Err(e) => Self::Failed(e.into()),
            },
        }
    }
}

/// Encodes an action into a text frame.
///
/// # Errors
///
/// Returns [`GatewayError::Codec`] if the payload cannot be serialized.
pub fn encode_frame(action: &Action) -> Result<Message, GatewayError> {
    Ok(Message::text(action.encode()?))
}

/// Writes one control action to a socket that has no outbound queue.
///
/// Failures are logged and swallowed: the caller's loop notices a dead
/// socket on its next read.
pub async fn send_action(socket: &mut WebSocket, action: &Action) {
    if let Err(e) = try_send(socket, action).await {
        tracing::error!(action_type = %action.action_type, error = %e, "failed to send action");
    }
}

async fn try_send(socket: &mut WebSocket, action: &Action) -> Result<(), GatewayError> {
    socket.send(encode_frame(action)?).await?;
    Ok(())
}

/// Write half of a split socket.
pub type SocketSink = SplitSink<WebSocket, Message>;
