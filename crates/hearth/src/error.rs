//! Unified error type for the Hearth client.

use hearth_protocol::ProtocolError;
use hearth_session::SessionError;
use hearth_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Applications using the `hearth` meta-crate can return this one type
/// and let `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    /// A transport-level error (connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (state, timeout, remote failure).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A global tracing subscriber was already installed.
    #[error("logging already initialized: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}
