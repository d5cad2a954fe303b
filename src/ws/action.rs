//! Action envelope: the `{Type, Payload}` unit used for all WebSocket traffic.
//!
//! Control actions emitted by the gateway itself use the reserved types
//! below. Every other action (region state updates, client requests) is
//! opaque to this crate and passed through unchanged.

use serde::{Deserialize, Serialize};

/// Server tells the client to adopt the single available region.
pub const SET_NOMAD_REGION: &str = "SET_NOMAD_REGION";

/// Server offers the list of known regions for the client to choose from.
pub const FETCHED_NOMAD_REGIONS: &str = "FETCHED_NOMAD_REGIONS";

/// Server signals that the requested region does not exist.
pub const UNKNOWN_NOMAD_REGION: &str = "UNKNOWN_NOMAD_REGION";

/// Wire envelope exchanged in both directions.
///
/// ```json
/// { "Type": "FETCHED_NOMAD_REGIONS", "Payload": ["us-east", "eu-west"] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Discriminator string. A missing field decodes as an empty string.
    #[serde(rename = "Type", default)]
    pub action_type: String,
    /// Type-dependent payload. A missing field decodes as an empty string.
    #[serde(rename = "Payload", default)]
    pub payload: Payload,
}

/// Polymorphic action payload.
///
/// Variants are tried in declaration order when decoding, so a JSON string
/// always becomes [`Payload::Text`] and an array of strings always becomes
/// [`Payload::List`]. Anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// A single string, e.g. one region name. Empty for the unknown-region sentinel.
    Text(String),
    /// An ordered list of strings, e.g. region names.
    List(Vec<String>),
    /// Any other JSON value carried by pass-through actions.
    Opaque(serde_json::Value),
}

impl Default for Payload {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Action {
    /// Creates an action with an arbitrary type and payload.
    #[must_use]
    pub fn new(action_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            action_type: action_type.into(),
            payload,
        }
    }

    /// `SET_NOMAD_REGION` carrying the region the client should adopt.
    #[must_use]
    pub fn set_region(region: impl Into<String>) -> Self {
        Self::new(SET_NOMAD_REGION, Payload::Text(region.into()))
    }

    /// `FETCHED_NOMAD_REGIONS` carrying the full region list.
    #[must_use]
    pub fn fetched_regions(regions: Vec<String>) -> Self {
        Self::new(FETCHED_NOMAD_REGIONS, Payload::List(regions))
    }

    /// Unknown-region sentinel with an empty payload.
    #[must_use]
    pub fn unknown_region() -> Self {
        Self::new(UNKNOWN_NOMAD_REGION, Payload::default())
    }

    /// Encodes the action as a JSON text frame body.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if an opaque payload cannot be
    /// serialized (non-string map keys and similar).
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes an action from a JSON text frame body.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] for malformed JSON or a body that is
    /// not a JSON object.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
