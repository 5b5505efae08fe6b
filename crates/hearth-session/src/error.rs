//! Error types for the session layer.

use std::fmt;
use std::time::Duration;

use hearth_protocol::ProtocolError;
use hearth_transport::TransportError;

use crate::ConnectionState;

/// The operation a caller attempted, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    Login,
    Logout,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Login => "login",
            Self::Logout => "logout",
        })
    }
}

/// Errors surfaced by the session client.
///
/// State errors (`NotConnected`, `InvalidStateTransition`) are returned
/// to whoever attempted the operation. Query errors (`Timeout`,
/// `ConnectionLost`, `Remote`) go only to the caller that issued the
/// query. Malformed inbound frames that belong to nobody are logged and
/// never show up here.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operation needs an open connection and there is none.
    #[error("not connected")]
    NotConnected,

    /// The operation is not allowed in the current connection state.
    #[error("cannot {operation} while {state}")]
    InvalidStateTransition {
        state: ConnectionState,
        operation: Operation,
    },

    /// A response arrived but its payload did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(#[source] ProtocolError),

    /// No response arrived before the query's deadline.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The connection closed while the query was outstanding.
    #[error("connection lost")]
    ConnectionLost,

    /// The remote service answered with a failure.
    #[error("remote error: {0}")]
    Remote(String),

    /// The outgoing query could not be encoded (e.g. invalid payload).
    #[error(transparent)]
    Protocol(ProtocolError),

    /// Opening or writing to the connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session worker has shut down.
    #[error("session worker stopped")]
    WorkerStopped,
}
