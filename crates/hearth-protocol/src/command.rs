//! Commands the client can send, each with an explicit payload schema.
//!
//! Every [`Command`] has a typed request and a typed response. Callers that
//! build payloads by hand (`serde_json::Value`) are checked against the
//! request type before anything is sent, so a wrongly shaped payload fails
//! locally instead of as a confusing remote error.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProtocolError, SessionUser};

/// A remote command with a known schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Login,
    Logout,
    GetUserInfo,
}

impl Command {
    /// Every known command.
    pub const ALL: [Command; 3] =
        [Command::Login, Command::Logout, Command::GetUserInfo];

    /// The name carried in the `command` field of a query frame.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::GetUserInfo => "GETUSERINFO",
        }
    }

    /// Checks `payload` against this command's request schema.
    pub fn validate_request(self, payload: &Value) -> Result<(), ProtocolError> {
        match self {
            Self::Login => check::<LoginRequest>(self, payload),
            Self::Logout => check::<LogoutRequest>(self, payload),
            Self::GetUserInfo => check::<GetUserInfoRequest>(self, payload),
        }
    }
}

fn check<T: DeserializeOwned>(
    command: Command,
    payload: &Value,
) -> Result<(), ProtocolError> {
    T::deserialize(payload)
        .map(|_| ())
        .map_err(|source| ProtocolError::InvalidPayload {
            command: command.wire_name(),
            source,
        })
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.wire_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::UnknownCommand(s.to_string()))
    }
}

/// Binds a typed request to its command and response type.
pub trait Query: Serialize + Send + 'static {
    const COMMAND: Command;
    type Response: DeserializeOwned + Send + 'static;
}

/// Decodes a successful response payload into the query's response type.
pub fn decode_response<Q: Query>(payload: Value) -> Result<Q::Response, ProtocolError> {
    serde_json::from_value(payload).map_err(|source| ProtocolError::InvalidPayload {
        command: Q::COMMAND.wire_name(),
        source,
    })
}

// ---------------------------------------------------------------------------
// LOGIN
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct LoginRequest {
    pub mail: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginResponse {
    pub remote_user: SessionUser,
}

impl Query for LoginRequest {
    const COMMAND: Command = Command::Login;
    type Response = LoginResponse;
}

// ---------------------------------------------------------------------------
// LOGOUT
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogoutRequest {}

/// Whatever the service sends back; the content is not inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogoutResponse(pub Value);

impl Query for LogoutRequest {
    const COMMAND: Command = Command::Logout;
    type Response = LogoutResponse;
}

// ---------------------------------------------------------------------------
// GETUSERINFO
// ---------------------------------------------------------------------------

/// An empty `user_name` asks for the logged-in account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct GetUserInfoRequest {
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserInfoResponse {
    pub remote_user: SessionUser,
}

impl Query for GetUserInfoRequest {
    const COMMAND: Command = Command::GetUserInfo;
    type Response = UserInfoResponse;
}
