//! Remote session client for the Hearth launcher.
//!
//! This crate keeps the launcher's connection to the remote service:
//!
//! 1. **State** — where the client is in the connect/login lifecycle
//!    ([`ConnectionState`], published to [`SessionClient::on_state_change`])
//! 2. **Queries** — request/response pairing with deadlines
//!    ([`SessionClient::query`], [`SessionClient::request`])
//! 3. **Refresh** — a periodic user-info query while logged in, feeding
//!    [`SessionClient::on_user_updated`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Launcher UI (above)  ← SessionClient handles, subscriptions
//!     ↕
//! Session Layer (this crate)  ← one worker task owns all mutable state
//!     ↕
//! Protocol Layer (below)  ← frames, commands, SessionUser
//!     ↕
//! Transport Layer  ← Connector / Connection
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hearth_session::{Credentials, SessionClient, SessionConfig};
//! use hearth_transport::WebSocketConnector;
//!
//! # async fn run() -> Result<(), hearth_session::SessionError> {
//! let client = SessionClient::spawn(
//!     WebSocketConnector,
//!     SessionConfig::with_endpoint("ws://127.0.0.1:8080"),
//! );
//! client.connect().await?;
//! let user = client.login(Credentials::new("ada@example.com", "pw")).await?;
//! println!("logged in as {}", user.profile_name);
//! client.logout().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod correlator;
mod credentials;
mod error;
mod refresh;
mod state;
mod subscribers;
mod worker;

pub use client::SessionClient;
pub use config::SessionConfig;
pub use correlator::{Correlator, PendingQuery};
pub use credentials::Credentials;
pub use error::{Operation, SessionError};
pub use refresh::RefreshTimer;
pub use state::{ConnectionState, StateChange, StateMachine, Trigger};
pub use subscribers::{Subscribers, Subscription, SubscriptionId};
