//! The connection/authentication state machine.
//!
//! ```text
//!            connect()            Opened           login()          login ok
//! Offline ───────────→ Connecting ──────→ Connected ───────→ Logging ───────→ Logged
//!    ↑                     │                  │                 │                │
//!    └──── Closed ─────────┴──── Closed ──────┴─ Closed / fail ─┴─ Closed/logout ┘
//! ```
//!
//! [`ConnectionState::next`] is the transition table. [`StateMachine`]
//! owns the current value, publishes every transition to subscribers,
//! and mirrors the value into a `watch` channel so readers never need to
//! ask the worker.

use std::fmt;

use tokio::sync::watch;

use crate::Subscribers;

/// Where the client is in the connection/authentication lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Offline,
    Connecting,
    Connected,
    Logging,
    Logged,
}

impl ConnectionState {
    /// Every state, in lifecycle order.
    pub const ALL: [ConnectionState; 5] = [
        Self::Offline,
        Self::Connecting,
        Self::Connected,
        Self::Logging,
        Self::Logged,
    ];

    /// Whether a transport connection is open in this state.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::Logging | Self::Logged)
    }

    /// The state `trigger` leads to, or `None` if it is not allowed here.
    pub fn next(self, trigger: Trigger) -> Option<ConnectionState> {
        use ConnectionState::*;
        match (self, trigger) {
            (Offline, Trigger::Connect) => Some(Connecting),
            (Connecting, Trigger::Opened) => Some(Connected),
            (Connecting, Trigger::Closed) => Some(Offline),
            (Connected, Trigger::Login) => Some(Logging),
            (Logging, Trigger::LoginSucceeded) => Some(Logged),
            (Logging, Trigger::LoginFailed) => Some(Offline),
            (Logged, Trigger::Logout) => Some(Offline),
            (Connected | Logging | Logged, Trigger::Closed) => Some(Offline),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Offline => "offline",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Logging => "logging in",
            Self::Logged => "logged in",
        })
    }
}

/// What can move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Connect,
    Opened,
    Closed,
    Login,
    LoginSucceeded,
    LoginFailed,
    Logout,
}

impl Trigger {
    pub const ALL: [Trigger; 7] = [
        Self::Connect,
        Self::Opened,
        Self::Closed,
        Self::Login,
        Self::LoginSucceeded,
        Self::LoginFailed,
        Self::Logout,
    ];
}

/// One transition, as delivered to `on_state_change` subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub old: ConnectionState,
    pub new: ConnectionState,
}

/// Single owner of the current [`ConnectionState`].
pub struct StateMachine {
    state: ConnectionState,
    watch: watch::Sender<ConnectionState>,
    subscribers: Subscribers<StateChange>,
}

impl StateMachine {
    /// Creates a machine in `Offline` that publishes to `subscribers`.
    pub fn new(subscribers: Subscribers<StateChange>) -> Self {
        let (watch, _) = watch::channel(ConnectionState::Offline);
        Self {
            state: ConnectionState::Offline,
            watch,
            subscribers,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// A receiver that always sees the latest state.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.watch.subscribe()
    }

    /// Applies `trigger` if the table allows it.
    ///
    /// On success the watch channel is updated first, then subscribers are
    /// notified. A disallowed trigger leaves the state untouched and
    /// returns `None`.
    pub fn apply(&mut self, trigger: Trigger) -> Option<StateChange> {
        let Some(new) = self.state.next(trigger) else {
            tracing::debug!(state = %self.state, ?trigger, "trigger ignored in this state");
            return None;
        };
        let change = StateChange {
            old: self.state,
            new,
        };
        self.state = new;
        self.watch.send_replace(new);
        tracing::info!(from = %change.old, to = %change.new, ?trigger, "connection state changed");
        self.subscribers.publish(&change);
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    fn machine() -> StateMachine {
        StateMachine::new(Subscribers::new())
    }

    #[test]
    fn test_initial_state_is_offline() {
        let m = machine();
        assert_eq!(m.state(), Offline);
        assert_eq!(*m.watch().borrow(), Offline);
    }

    #[test]
    fn test_happy_path_to_logged_and_back() {
        let mut m = machine();
        for (trigger, expected) in [
            (Trigger::Connect, Connecting),
            (Trigger::Opened, Connected),
            (Trigger::Login, Logging),
            (Trigger::LoginSucceeded, Logged),
            (Trigger::Logout, Offline),
        ] {
            let change = m.apply(trigger).expect("allowed");
            assert_eq!(change.new, expected);
            assert_eq!(m.state(), expected);
        }
    }

    #[test]
    fn test_closed_from_every_connected_state_goes_offline() {
        for state in [Connecting, Connected, Logging, Logged] {
            assert_eq!(state.next(Trigger::Closed), Some(Offline), "from {state}");
        }
        assert_eq!(Offline.next(Trigger::Closed), None);
    }

    #[test]
    fn test_login_failure_goes_offline() {
        assert_eq!(Logging.next(Trigger::LoginFailed), Some(Offline));
    }

    #[test]
    fn test_login_only_from_connected() {
        for state in ConnectionState::ALL {
            let expected = (state == Connected).then_some(Logging);
            assert_eq!(state.next(Trigger::Login), expected, "from {state}");
        }
    }

    #[test]
    fn test_disallowed_trigger_leaves_state_unchanged() {
        let mut m = machine();
        let mut changes = m.subscribers.subscribe();
        assert_eq!(m.apply(Trigger::Login), None);
        assert_eq!(m.apply(Trigger::Opened), None);
        assert_eq!(m.state(), Offline);
        assert_eq!(changes.try_recv(), None);
    }

    #[test]
    fn test_every_sequence_stays_on_the_table() {
        // Exhaustively walk all trigger sequences up to length 5 and check
        // each step against the table.
        fn walk(m_state: ConnectionState, depth: usize) {
            if depth == 0 {
                return;
            }
            for trigger in Trigger::ALL {
                let mut m = machine();
                m.state = m_state;
                let before = m.state();
                match m.apply(trigger) {
                    Some(change) => {
                        assert_eq!(change.old, before);
                        assert_eq!(Some(change.new), before.next(trigger));
                        assert_eq!(m.state(), change.new);
                    }
                    None => {
                        assert_eq!(before.next(trigger), None);
                        assert_eq!(m.state(), before);
                    }
                }
                assert!(ConnectionState::ALL.contains(&m.state()));
                walk(m.state(), depth - 1);
            }
        }
        walk(Offline, 5);
    }

    #[test]
    fn test_transitions_are_published_in_order() {
        let mut m = machine();
        let mut changes = m.subscribers.subscribe();
        m.apply(Trigger::Connect);
        m.apply(Trigger::Closed);

        assert_eq!(
            changes.try_recv(),
            Some(StateChange { old: Offline, new: Connecting })
        );
        assert_eq!(
            changes.try_recv(),
            Some(StateChange { old: Connecting, new: Offline })
        );
        assert_eq!(*m.watch().borrow(), Offline);
    }
}
