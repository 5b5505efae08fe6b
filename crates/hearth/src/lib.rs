//! # Hearth
//!
//! Remote session client for the Hearth game launcher.
//!
//! Hearth keeps the launcher's single connection to the remote account
//! service: it connects, logs in, correlates queries with their responses,
//! refreshes the account snapshot in the background while logged in, and
//! tells the UI about every state change.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearth::prelude::*;
//!
//! # async fn run() -> Result<(), HearthError> {
//! hearth::logging::init(2)?;
//!
//! let client = HearthClientBuilder::new()
//!     .endpoint("ws://127.0.0.1:8080")
//!     .build();
//! let mut changes = client.on_state_change();
//!
//! client.connect().await?;
//! let user = client.login(Credentials::new("ada@example.com", "pw")).await?;
//! println!("{} (banned from: {})", user.profile_name, user.ban_status());
//!
//! while let Some(change) = changes.recv().await {
//!     println!("{} -> {}", change.old, change.new);
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod error;
pub mod logging;

pub use builder::HearthClientBuilder;
pub use error::HearthError;

pub use hearth_protocol as protocol;
pub use hearth_session as session;
pub use hearth_transport as transport;

/// Convenience re-exports for the common client surface.
pub mod prelude {
    pub use crate::{HearthClientBuilder, HearthError};
    pub use hearth_protocol::{
        Command, GetUserInfoRequest, Payload, Query, Services, SessionUser,
        UnsolicitedEvent,
    };
    pub use hearth_session::{
        ConnectionState, Credentials, SessionClient, SessionConfig,
        SessionError, StateChange, Subscription, SubscriptionId,
    };
}
