//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the problem is in the shape of a
//! message (encoding, decoding, schema validation), never in the network
//! or the session state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, wrong
    /// data types, or an unknown frame kind.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The command name is not one this client knows a schema for.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The payload does not match the command's request or response schema.
    #[error("invalid payload for {command}: {source}")]
    InvalidPayload {
        command: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The frame parsed but is not valid in this direction or context,
    /// e.g. the remote side sending us a query.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
