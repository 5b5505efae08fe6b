//! The public façade over the session worker.

use std::sync::Arc;
use std::time::Duration;

use hearth_protocol::{
    Command, Payload, ProtocolError, Query, SessionUser, UnsolicitedEvent,
    decode_response,
};
use hearth_transport::Connector;
use tokio::sync::{mpsc, oneshot, watch};

use crate::worker::{Channels, Reply, Request, Worker};
use crate::{
    ConnectionState, Credentials, SessionConfig, SessionError, StateChange,
    Subscription, SubscriptionId,
};

/// Handle to a running session.
///
/// Cheap to clone. Every operation is queued to the single session worker
/// and answered over a oneshot channel, so calls from any task are
/// serialized with transport events and the refresh timer. State and the
/// current user are mirrored into `watch` channels and can be read without
/// a round trip.
///
/// The worker stops when [`shutdown`](Self::shutdown) is called or when
/// the last handle is dropped.
#[derive(Clone)]
pub struct SessionClient {
    requests: mpsc::Sender<Request>,
    state: watch::Receiver<ConnectionState>,
    user: watch::Receiver<Option<Arc<SessionUser>>>,
    channels: Channels,
    query_timeout: Duration,
}

impl SessionClient {
    /// Spawns the session worker on the current Tokio runtime.
    pub fn spawn<K: Connector>(connector: K, config: SessionConfig) -> Self {
        let config = config.validated();
        let (requests, rx) = mpsc::channel(config.command_buffer);
        let channels = Channels::default();
        let query_timeout = config.query_timeout;

        let worker = Worker::new(connector, config, channels.clone(), rx);
        let state = worker.state_watch();
        let user = worker.user_watch();
        tokio::spawn(worker.run());

        Self {
            requests,
            state,
            user,
            channels,
            query_timeout,
        }
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Request) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(make(reply))
            .await
            .map_err(|_| SessionError::WorkerStopped)?;
        rx.await.map_err(|_| SessionError::WorkerStopped)?
    }

    /// Opens the connection. Resolves once the session is `Connected`.
    ///
    /// # Errors
    /// `InvalidStateTransition` unless `Offline`; `Transport` if the
    /// endpoint cannot be reached (the session is back to `Offline`).
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.call(|reply| Request::Connect { reply }).await
    }

    /// Authenticates and returns the account snapshot from the reply.
    ///
    /// Only valid while `Connected`. Any failure (remote rejection,
    /// timeout, malformed reply) ends in `Offline` with the connection
    /// closed.
    pub async fn login(&self, credentials: Credentials) -> Result<Arc<SessionUser>, SessionError> {
        self.call(|reply| Request::Login { credentials, reply }).await
    }

    /// Logs out and closes the connection.
    ///
    /// A no-op while `Offline`. Fails with `InvalidStateTransition` while
    /// connecting or logging in.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.call(|reply| Request::Logout { reply }).await
    }

    /// Issues a raw query and waits for its outcome.
    ///
    /// `payload` is checked against the command's request schema before
    /// anything is sent.
    ///
    /// # Errors
    /// `NotConnected` unless a connection is open, then exactly one of
    /// `Remote`, `Timeout`, `ConnectionLost` (or `Protocol`/`Transport` if
    /// the query never left).
    pub async fn query(
        &self,
        command: Command,
        payload: Payload,
        timeout: Duration,
    ) -> Result<Payload, SessionError> {
        self.call(|reply| Request::Query {
            command,
            payload,
            timeout,
            reply,
        })
        .await
    }

    /// Issues a typed query and decodes the response.
    pub async fn request<Q: Query>(
        &self,
        request: Q,
        timeout: Duration,
    ) -> Result<Q::Response, SessionError> {
        let payload = serde_json::to_value(&request)
            .map_err(|e| SessionError::Protocol(ProtocolError::Encode(e)))?;
        let response = self.query(Q::COMMAND, payload, timeout).await?;
        decode_response::<Q>(response).map_err(SessionError::Decode)
    }

    /// Default deadline for queries, from [`SessionConfig::query_timeout`].
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// The latest account snapshot, present only while logged in.
    pub fn current_user(&self) -> Option<Arc<SessionUser>> {
        self.user.borrow().clone()
    }

    /// Every state transition, in order.
    pub fn on_state_change(&self) -> Subscription<StateChange> {
        self.channels.states.subscribe()
    }

    /// Every new account snapshot (login and each successful refresh).
    pub fn on_user_updated(&self) -> Subscription<Arc<SessionUser>> {
        self.channels.users.subscribe()
    }

    /// Frames the service sends without being asked.
    pub fn on_event(&self) -> Subscription<UnsolicitedEvent> {
        self.channels.events.subscribe()
    }

    /// Removes a subscriber from whichever list holds it.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.channels.states.unsubscribe(id)
            || self.channels.users.unsubscribe(id)
            || self.channels.events.unsubscribe(id)
    }

    /// Waits until the session is `Logged` and returns the user.
    pub async fn wait_until_logged(&self) -> Result<Arc<SessionUser>, SessionError> {
        let mut state = self.state.clone();
        loop {
            state
                .wait_for(|s| *s == ConnectionState::Logged)
                .await
                .map_err(|_| SessionError::WorkerStopped)?;
            if let Some(user) = self.current_user() {
                return Ok(user);
            }
            state
                .changed()
                .await
                .map_err(|_| SessionError::WorkerStopped)?;
        }
    }

    /// Goes offline and stops the worker. Other handles get
    /// `WorkerStopped` from then on.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.requests.send(Request::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("state", &self.current_state())
            .finish_non_exhaustive()
    }
}
