//! Frame types for Hearth's wire format.
//!
//! Every message on the wire is a [`Frame`]. Three kinds exist:
//!
//! ```text
//! client → service   Query    { command, id, payload }
//! service → client   Response { id, success, payload | error }
//! service → client   Event    { event_type, payload }
//! ```
//!
//! Queries and responses are paired by their [`CorrelationId`]; events are
//! not correlated with anything.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// CorrelationId
// ---------------------------------------------------------------------------

/// Opaque token pairing a query with its eventual response.
///
/// Serialized as a plain string. Freshly generated ids are 32 lowercase
/// hex characters (128 random bits), but any string the service echoes
/// back is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generates a new random id.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Wraps an existing token.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The token as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// The top-level wire message.
///
/// `#[serde(tag = "kind")]` produces internally tagged JSON:
/// `{ "kind": "Query", "command": "GETUSERINFO", "id": "…", "payload": {…} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Frame {
    /// Client → service: run `command` with `payload`, answer under `id`.
    Query {
        command: String,
        id: CorrelationId,
        #[serde(default)]
        payload: Value,
    },

    /// Service → client: the answer to the query registered under `id`.
    ///
    /// `payload` is set on success, `error` on failure.
    Response {
        id: CorrelationId,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Service → client: something happened that nobody asked about.
    Event {
        event_type: String,
        #[serde(default)]
        payload: Value,
    },
}

impl Frame {
    /// Builds a successful response frame.
    pub fn success(id: CorrelationId, payload: Value) -> Self {
        Self::Response {
            id,
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Builds a failed response frame.
    pub fn failure(id: CorrelationId, error: impl Into<String>) -> Self {
        Self::Response {
            id,
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded inbound messages
// ---------------------------------------------------------------------------

/// An inbound frame that is not tied to any outstanding query.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsolicitedEvent {
    pub event_type: String,
    pub payload: Value,
}

/// The service's answer to one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub id: CorrelationId,
    /// `Ok(payload)` on success, `Err(message)` when the service reported
    /// a failure.
    pub outcome: Result<Value, String>,
}

/// What [`MessageCodec::decode`](crate::MessageCodec::decode) turns a frame into.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(UnsolicitedEvent),
    Response(QueryResponse),
}
