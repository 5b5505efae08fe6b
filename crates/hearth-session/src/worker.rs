//! The session worker: one task that owns everything mutable.
//!
//! Handles talk to the worker over a bounded request queue. The worker
//! owns the connection, the state machine, the correlator and the refresh
//! timer, and processes one wake-up at a time from a single `select!`:
//!
//! - a request from a [`SessionClient`](crate::SessionClient) handle
//! - the outcome of a connect attempt (run as a spawned task)
//! - an event from the current connection's receive pump
//! - a refresh tick
//! - the earliest query deadline
//!
//! The worker never awaits I/O itself. Outbound frames are queued to a
//! per-connection writer task, so a peer that stops reading cannot hold up
//! deadlines, logout or close handling.
//!
//! State-change notifications are always published before any query
//! result caused by the same wake-up is delivered.

use std::sync::Arc;
use std::time::Duration;

use hearth_protocol::{
    Command, CorrelationId, GetUserInfoRequest, Inbound, LoginRequest,
    LogoutRequest, MessageCodec, Payload, ProtocolError, Query, SessionUser,
    UnsolicitedEvent, decode_response,
};
use hearth_transport::{
    Connection, Connector, TransportError, TransportEvent, pump_events, write_frames,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

use crate::correlator::Correlator;
use crate::refresh::RefreshTimer;
use crate::{
    ConnectionState, Credentials, Operation, SessionConfig, SessionError,
    StateMachine, StateChange, Subscribers, Trigger,
};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// How long a dropped connection may keep flushing queued frames before
/// it is closed anyway.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Requests sent from handles to the worker.
pub(crate) enum Request {
    Connect {
        reply: Reply<()>,
    },
    Login {
        credentials: Credentials,
        reply: Reply<Arc<SessionUser>>,
    },
    Logout {
        reply: Reply<()>,
    },
    Query {
        command: Command,
        payload: Payload,
        timeout: Duration,
        reply: Reply<Payload>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Who is waiting on a pending query.
enum Completion {
    /// A caller of `query`/`request`.
    Caller(Reply<Payload>),
    /// The caller of `login`; success moves the session to `Logged`.
    Login(Reply<Arc<SessionUser>>),
    /// The background refresher; nobody is waiting.
    Refresh,
}

/// The open connection with its receive pump and writer.
struct Link<C> {
    conn: Arc<C>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    frames: mpsc::UnboundedSender<Vec<u8>>,
    pump: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// An in-flight connect attempt.
struct Attempt {
    reply: Reply<()>,
    task: JoinHandle<()>,
}

enum Wake<C> {
    Request(Option<Request>),
    Connected(Result<C, TransportError>),
    Transport(Option<TransportEvent>),
    Refresh(u64),
    Deadline,
}

/// Notification lists shared between the worker and its handles.
#[derive(Clone, Default)]
pub(crate) struct Channels {
    pub(crate) states: Subscribers<StateChange>,
    pub(crate) users: Subscribers<Arc<SessionUser>>,
    pub(crate) events: Subscribers<UnsolicitedEvent>,
}

pub(crate) struct Worker<K: Connector> {
    connector: Arc<K>,
    config: SessionConfig,
    codec: MessageCodec,
    machine: StateMachine,
    correlator: Correlator<Completion>,
    refresh: RefreshTimer,
    user: watch::Sender<Option<Arc<SessionUser>>>,
    channels: Channels,
    requests: mpsc::Receiver<Request>,
    outcomes_tx: mpsc::UnboundedSender<Result<K::Connection, TransportError>>,
    outcomes_rx: mpsc::UnboundedReceiver<Result<K::Connection, TransportError>>,
    attempt: Option<Attempt>,
    link: Option<Link<K::Connection>>,
}

impl<K: Connector> Worker<K> {
    pub(crate) fn new(
        connector: K,
        config: SessionConfig,
        channels: Channels,
        requests: mpsc::Receiver<Request>,
    ) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let (user, _) = watch::channel(None);
        Self {
            connector: Arc::new(connector),
            refresh: RefreshTimer::new(config.refresh_interval),
            config,
            codec: MessageCodec::default(),
            machine: StateMachine::new(channels.states.clone()),
            correlator: Correlator::new(),
            user,
            channels,
            requests,
            outcomes_tx,
            outcomes_rx,
            attempt: None,
            link: None,
        }
    }

    pub(crate) fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.machine.watch()
    }

    pub(crate) fn user_watch(&self) -> watch::Receiver<Option<Arc<SessionUser>>> {
        self.user.subscribe()
    }

    /// Runs until shut down or until every handle is dropped.
    pub(crate) async fn run(mut self) {
        info!(endpoint = %self.config.endpoint, "session worker started");

        let shutdown_reply = loop {
            let deadline = self.correlator.next_deadline();
            let wake = tokio::select! {
                req = self.requests.recv() => Wake::Request(req),
                Some(outcome) = self.outcomes_rx.recv() => Wake::Connected(outcome),
                event = next_event(&mut self.link) => Wake::Transport(event),
                tick = self.refresh.wait() => Wake::Refresh(tick),
                () = sleep_until(deadline) => Wake::Deadline,
            };

            match wake {
                Wake::Request(None) => {
                    debug!("all session handles dropped");
                    break None;
                }
                Wake::Request(Some(Request::Shutdown { reply })) => break Some(reply),
                Wake::Request(Some(req)) => self.handle_request(req),
                Wake::Connected(outcome) => self.handle_connect_outcome(outcome),
                Wake::Transport(event) => self.handle_transport(event),
                Wake::Refresh(tick) => self.handle_refresh_tick(tick),
                Wake::Deadline => self.expire_queries(),
            }
        };

        if self.machine.state() != ConnectionState::Offline {
            self.go_offline(Trigger::Closed, "session shut down");
        }
        if let Some(attempt) = self.attempt.take() {
            attempt.task.abort();
            let _ = attempt.reply.send(Err(SessionError::WorkerStopped));
        }
        info!("session worker stopped");
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    fn handle_request(&mut self, req: Request) {
        match req {
            Request::Connect { reply } => self.handle_connect(reply),
            Request::Login { credentials, reply } => self.handle_login(credentials, reply),
            Request::Logout { reply } => self.handle_logout(reply),
            Request::Query {
                command,
                payload,
                timeout,
                reply,
            } => {
                if self.machine.state().is_connected() {
                    self.issue(command, payload, timeout, Completion::Caller(reply));
                } else {
                    let _ = reply.send(Err(SessionError::NotConnected));
                }
            }
            // Handled in `run`.
            Request::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    // -- state changes ------------------------------------------------------

    /// Applies `trigger` and keeps the refresh timer bound to `Logged`.
    fn transition(&mut self, trigger: Trigger) -> Option<StateChange> {
        let change = self.machine.apply(trigger)?;
        if change.new == ConnectionState::Logged {
            self.refresh.start();
        } else if change.old == ConnectionState::Logged {
            self.refresh.stop();
        }
        Some(change)
    }

    /// Moves to `Offline` and releases everything tied to the connection.
    ///
    /// The state change is published first; only then are outstanding
    /// queries failed with `ConnectionLost`.
    fn go_offline(&mut self, trigger: Trigger, reason: &str) {
        if self.transition(trigger).is_none() {
            return;
        }
        info!(%reason, "session offline");
        self.user.send_replace(None);

        if let Some(link) = self.link.take() {
            let Link {
                conn,
                frames,
                pump,
                writer,
                ..
            } = link;
            pump.abort();
            // Closing the queue lets the writer flush what is left and stop.
            drop(frames);
            tokio::spawn(async move {
                let abort = writer.abort_handle();
                if time::timeout(CLOSE_GRACE, writer).await.is_err() {
                    abort.abort();
                    debug!(id = %conn.id(), "peer not reading, dropping queued frames");
                }
                if let Err(e) = conn.close().await {
                    debug!(id = %conn.id(), error = %e, "error while closing connection");
                }
            });
        }

        for (id, pending) in self.correlator.drain() {
            debug!(%id, command = %pending.command, "query failed: connection lost");
            self.finish(pending.completion, Err(SessionError::ConnectionLost));
        }
    }

    fn invalid(&self, operation: Operation) -> SessionError {
        SessionError::InvalidStateTransition {
            state: self.machine.state(),
            operation,
        }
    }

    // -- connect ------------------------------------------------------------

    fn handle_connect(&mut self, reply: Reply<()>) {
        if self.machine.state() != ConnectionState::Offline {
            let _ = reply.send(Err(self.invalid(Operation::Connect)));
            return;
        }
        self.transition(Trigger::Connect);

        let connector = Arc::clone(&self.connector);
        let endpoint = self.config.endpoint.clone();
        let outcomes = self.outcomes_tx.clone();
        info!(%endpoint, "connecting");
        let task = tokio::spawn(async move {
            let outcome = connector.connect(&endpoint).await;
            let _ = outcomes.send(outcome);
        });
        self.attempt = Some(Attempt { reply, task });
    }

    fn handle_connect_outcome(&mut self, outcome: Result<K::Connection, TransportError>) {
        let Some(attempt) = self.attempt.take() else {
            trace!("discarding outcome of an abandoned connect attempt");
            return;
        };
        match outcome {
            Ok(conn) => {
                let conn = Arc::new(conn);
                let (events_tx, events) = mpsc::unbounded_channel();
                let (frames, frames_rx) = mpsc::unbounded_channel();
                let writer = tokio::spawn(write_frames(
                    Arc::clone(&conn),
                    frames_rx,
                    events_tx.clone(),
                ));
                let pump = tokio::spawn(pump_events(Arc::clone(&conn), events_tx));
                info!(id = %conn.id(), "connection opened");
                self.link = Some(Link {
                    conn,
                    events,
                    frames,
                    pump,
                    writer,
                });
                self.transition(Trigger::Opened);
                let _ = attempt.reply.send(Ok(()));
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
                self.transition(Trigger::Closed);
                let _ = attempt.reply.send(Err(e.into()));
            }
        }
    }

    // -- login / logout -----------------------------------------------------

    fn handle_login(&mut self, credentials: Credentials, reply: Reply<Arc<SessionUser>>) {
        if self.machine.state() != ConnectionState::Connected {
            let _ = reply.send(Err(self.invalid(Operation::Login)));
            return;
        }
        let payload = match to_payload(&credentials.into_request()) {
            Ok(payload) => payload,
            Err(e) => {
                let _ = reply.send(Err(SessionError::Protocol(e)));
                return;
            }
        };
        self.transition(Trigger::Login);
        let timeout = self.config.login_timeout;
        self.issue(LoginRequest::COMMAND, payload, timeout, Completion::Login(reply));
    }

    fn finish_login(&mut self, reply: Reply<Arc<SessionUser>>, outcome: Result<Payload, SessionError>) {
        let user = outcome.and_then(|payload| {
            decode_response::<LoginRequest>(payload)
                .map(|resp| Arc::new(resp.remote_user))
                .map_err(SessionError::Decode)
        });
        match user {
            Ok(user) if self.machine.state() == ConnectionState::Logging => {
                self.user.send_replace(Some(Arc::clone(&user)));
                self.transition(Trigger::LoginSucceeded);
                info!(mail = %user.mail, profile = %user.profile_name, "logged in");
                self.channels.users.publish(&user);
                let _ = reply.send(Ok(user));
            }
            Ok(_) => {
                let _ = reply.send(Err(SessionError::ConnectionLost));
            }
            Err(e) => {
                if self.machine.state() == ConnectionState::Logging {
                    warn!(error = %e, "login failed");
                    self.go_offline(Trigger::LoginFailed, "login failed");
                }
                let _ = reply.send(Err(e));
            }
        }
    }

    fn handle_logout(&mut self, reply: Reply<()>) {
        match self.machine.state() {
            ConnectionState::Offline => {
                debug!("logout while offline, nothing to do");
                let _ = reply.send(Ok(()));
            }
            ConnectionState::Logged => {
                self.send_logout_notice();
                self.go_offline(Trigger::Logout, "logged out");
                let _ = reply.send(Ok(()));
            }
            _ => {
                let _ = reply.send(Err(self.invalid(Operation::Logout)));
            }
        }
    }

    /// Tells the service we are leaving. Nobody waits for the answer:
    /// the connection is closed once the writer has flushed it.
    fn send_logout_notice(&self) {
        let Some(link) = &self.link else { return };
        let id = CorrelationId::generate();
        match self.codec.encode_typed(&id, &LogoutRequest::default()) {
            Ok(frame) => {
                if link.frames.send(frame).is_err() {
                    debug!("writer gone, LOGOUT not sent");
                }
            }
            Err(e) => warn!(error = %e, "could not encode LOGOUT"),
        }
    }

    // -- queries ------------------------------------------------------------

    /// Registers, encodes and queues one query for the writer.
    ///
    /// A write that fails later comes back as `TransportEvent::Closed`,
    /// which fails the query with `ConnectionLost`.
    fn issue(
        &mut self,
        command: Command,
        payload: Payload,
        timeout: Duration,
        completion: Completion,
    ) {
        let Some(frames) = self.link.as_ref().map(|link| link.frames.clone()) else {
            self.finish(completion, Err(SessionError::NotConnected));
            return;
        };

        let id = self.correlator.register(command, timeout, completion);
        let frame = match self.codec.encode_query(command, &id, &payload) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(%id, %command, error = %e, "query rejected before sending");
                if let Some(pending) = self.correlator.resolve(&id) {
                    self.finish(pending.completion, Err(SessionError::Protocol(e)));
                }
                return;
            }
        };

        if frames.send(frame).is_err() {
            warn!(%id, %command, "writer gone, dropping connection");
            let pending = self.correlator.resolve(&id);
            self.go_offline(Trigger::Closed, "writer stopped");
            if let Some(pending) = pending {
                self.finish(pending.completion, Err(SessionError::ConnectionLost));
            }
        }
    }

    /// Delivers a query outcome to whoever is waiting on it.
    fn finish(&mut self, completion: Completion, outcome: Result<Payload, SessionError>) {
        match completion {
            Completion::Caller(reply) => {
                let _ = reply.send(outcome);
            }
            Completion::Login(reply) => self.finish_login(reply, outcome),
            Completion::Refresh => self.finish_refresh(outcome),
        }
    }

    fn expire_queries(&mut self) {
        for (id, pending) in self.correlator.expire(Instant::now()) {
            debug!(%id, command = %pending.command, timeout = ?pending.timeout, "query timed out");
            self.finish(pending.completion, Err(SessionError::Timeout(pending.timeout)));
        }
    }

    // -- refresh ------------------------------------------------------------

    fn handle_refresh_tick(&mut self, tick: u64) {
        if self.machine.state() != ConnectionState::Logged {
            return;
        }
        if self.correlator.any(|q| matches!(q.completion, Completion::Refresh)) {
            debug!(tick, "previous refresh still outstanding, skipping");
            return;
        }
        let payload = match to_payload(&GetUserInfoRequest::default()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "could not build refresh query");
                return;
            }
        };
        trace!(tick, "refreshing user info");
        let timeout = self.config.query_timeout;
        self.issue(GetUserInfoRequest::COMMAND, payload, timeout, Completion::Refresh);
    }

    fn finish_refresh(&mut self, outcome: Result<Payload, SessionError>) {
        let user = outcome.and_then(|payload| {
            decode_response::<GetUserInfoRequest>(payload).map_err(SessionError::Decode)
        });
        match user {
            Ok(resp) => {
                let user = Arc::new(resp.remote_user);
                debug!(mail = %user.mail, "user info refreshed");
                self.user.send_replace(Some(Arc::clone(&user)));
                self.channels.users.publish(&user);
            }
            Err(SessionError::ConnectionLost) => {}
            Err(e) => warn!(error = %e, "user refresh failed"),
        }
    }

    // -- transport ----------------------------------------------------------

    fn handle_transport(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::FrameReceived(frame)) => self.handle_frame(&frame),
            Some(TransportEvent::Opened) => trace!("transport opened"),
            Some(TransportEvent::Closed(reason)) => self.go_offline(Trigger::Closed, &reason),
            None => self.go_offline(Trigger::Closed, "event stream ended"),
        }
    }

    fn handle_frame(&mut self, frame: &[u8]) {
        match self.codec.decode(frame) {
            Ok(Inbound::Response(resp)) => match self.correlator.resolve(&resp.id) {
                Some(pending) => {
                    debug!(
                        id = %resp.id,
                        command = %pending.command,
                        success = resp.outcome.is_ok(),
                        elapsed = ?pending.issued_at.elapsed(),
                        "query resolved"
                    );
                    self.finish(pending.completion, resp.outcome.map_err(SessionError::Remote));
                }
                None => trace!(id = %resp.id, "discarding response for unknown or resolved query"),
            },
            Ok(Inbound::Event(event)) => {
                debug!(event_type = %event.event_type, "unsolicited event");
                self.channels.events.publish(&event);
            }
            Err(e) => warn!(error = %e, len = frame.len(), "dropping undecodable frame"),
        }
    }
}

fn to_payload<Q: Query>(request: &Q) -> Result<Payload, ProtocolError> {
    serde_json::to_value(request).map_err(ProtocolError::Encode)
}

async fn next_event<C>(link: &mut Option<Link<C>>) -> Option<TransportEvent> {
    match link {
        Some(link) => link.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
