//! `HearthClientBuilder`: the usual way to start a session client.

use std::time::Duration;

use hearth_session::{SessionClient, SessionConfig};
use hearth_transport::{Connector, WebSocketConnector};

/// Builder for a running [`SessionClient`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use hearth::prelude::*;
///
/// # async fn run() -> Result<(), HearthError> {
/// let client = HearthClientBuilder::new()
///     .endpoint("ws://launcher.example:8080")
///     .refresh_interval(Duration::from_secs(30))
///     .build();
/// client.connect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct HearthClientBuilder {
    config: SessionConfig,
}

impl HearthClientBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the remote service address.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Replaces the whole session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = timeout;
        self
    }

    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.config.login_timeout = timeout;
        self
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.config.refresh_interval = interval;
        self
    }

    /// The configuration the client will be started with.
    pub fn session_config(&self) -> &SessionConfig {
        &self.config
    }

    /// Starts a client that connects over WebSocket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> SessionClient {
        self.build_with(WebSocketConnector)
    }

    /// Starts a client over any [`Connector`].
    pub fn build_with<K: Connector>(self, connector: K) -> SessionClient {
        tracing::debug!(endpoint = %self.config.endpoint, "starting session client");
        SessionClient::spawn(connector, self.config)
    }
}
