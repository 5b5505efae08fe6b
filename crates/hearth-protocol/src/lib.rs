//! Wire protocol for Hearth.
//!
//! This crate defines the "language" the launcher and the remote service
//! speak:
//!
//! - **Frames** ([`Frame`], [`CorrelationId`]) — what travels on the wire.
//! - **Commands** ([`Command`], [`Query`]) — the remote commands the client
//!   knows, each with a typed request and response schema.
//! - **Codecs** ([`Codec`], [`JsonCodec`], [`MessageCodec`]) — how frames
//!   become bytes, and how inbound bytes are classified.
//! - **Account data** ([`SessionUser`]) — the user snapshot.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and session
//! (connection state, query correlation). It knows nothing about
//! connections or timeouts.
//!
//! ```text
//! Transport (bytes) → Protocol (Frame / Inbound) → Session (state, queries)
//! ```

mod codec;
mod command;
mod error;
mod types;
mod user;

pub use codec::{Codec, JsonCodec, MessageCodec, UNSPECIFIED_REMOTE_ERROR};
pub use command::{
    Command, GetUserInfoRequest, LoginRequest, LoginResponse, LogoutRequest,
    LogoutResponse, Query, UserInfoResponse, decode_response,
};
pub use error::ProtocolError;
pub use types::{CorrelationId, Frame, Inbound, QueryResponse, UnsolicitedEvent};
pub use user::{Services, SessionUser};

/// Loosely-typed payload carried by queries, responses and events.
pub use serde_json::Value as Payload;
