//! Session client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Settings for one [`SessionClient`](crate::SessionClient).
///
/// Every field has a default, so a partial config (e.g. only `endpoint`)
/// deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Address of the remote session service.
    pub endpoint: String,

    /// Deadline for ordinary queries issued through `query`/`request`.
    pub query_timeout: Duration,

    /// Deadline for the LOGIN query.
    pub login_timeout: Duration,

    /// Period of the background GETUSERINFO refresh while logged in.
    pub refresh_interval: Duration,

    /// Capacity of the request queue between handles and the worker.
    pub command_buffer: usize,
}

impl SessionConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "ws://127.0.0.1:8080";
    pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(15);
    pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
    pub const DEFAULT_COMMAND_BUFFER: usize = 64;

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Replaces out-of-range values so the config is safe to run with.
    ///
    /// Zero durations fall back to their defaults and the request queue
    /// holds at least one entry.
    pub fn validated(mut self) -> Self {
        fn non_zero(name: &str, value: &mut Duration, default: Duration) {
            if value.is_zero() {
                warn!(field = name, ?default, "zero duration in session config, using default");
                *value = default;
            }
        }
        non_zero("query_timeout", &mut self.query_timeout, Self::DEFAULT_QUERY_TIMEOUT);
        non_zero("login_timeout", &mut self.login_timeout, Self::DEFAULT_LOGIN_TIMEOUT);
        non_zero(
            "refresh_interval",
            &mut self.refresh_interval,
            Self::DEFAULT_REFRESH_INTERVAL,
        );
        if self.command_buffer == 0 {
            warn!("command_buffer is 0, using 1");
            self.command_buffer = 1;
        }
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            query_timeout: Self::DEFAULT_QUERY_TIMEOUT,
            login_timeout: Self::DEFAULT_LOGIN_TIMEOUT,
            refresh_interval: Self::DEFAULT_REFRESH_INTERVAL,
            command_buffer: Self::DEFAULT_COMMAND_BUFFER,
        }
    }
}
