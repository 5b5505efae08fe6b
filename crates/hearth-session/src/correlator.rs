//! Matching outstanding queries to their responses.
//!
//! The correlator is plain bookkeeping: it owns every [`PendingQuery`],
//! hands each one back exactly once (on response, deadline, or drain) and
//! knows the earliest deadline so the worker can sleep until it. What a
//! completion slot *is* stays generic; the worker decides what to do with
//! the slot it gets back.

use std::collections::HashMap;
use std::time::Duration;

use hearth_protocol::{Command, CorrelationId};
use tokio::time::Instant;

/// Stand-in for "never" when a deadline does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + after`, capped at roughly thirty years out.
pub(crate) fn deadline_after(from: Instant, after: Duration) -> Instant {
    from.checked_add(after)
        .unwrap_or_else(|| from + FAR_FUTURE)
}

/// One query awaiting its response.
#[derive(Debug)]
pub struct PendingQuery<P> {
    pub command: Command,
    pub issued_at: Instant,
    pub timeout: Duration,
    pub completion: P,
}

impl<P> PendingQuery<P> {
    /// When the query times out. Huge timeouts saturate instead of
    /// overflowing.
    pub fn deadline(&self) -> Instant {
        deadline_after(self.issued_at, self.timeout)
    }
}

/// Registry of in-flight queries keyed by correlation id.
#[derive(Debug)]
pub struct Correlator<P> {
    pending: HashMap<CorrelationId, PendingQuery<P>>,
}

impl<P> Default for Correlator<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Correlator<P> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// Registers a query and returns its fresh correlation id.
    pub fn register(
        &mut self,
        command: Command,
        timeout: Duration,
        completion: P,
    ) -> CorrelationId {
        let mut id = CorrelationId::generate();
        while self.pending.contains_key(&id) {
            id = CorrelationId::generate();
        }
        self.pending.insert(
            id.clone(),
            PendingQuery {
                command,
                issued_at: Instant::now(),
                timeout,
                completion,
            },
        );
        tracing::debug!(%id, %command, ?timeout, "query registered");
        id
    }

    /// Removes and returns the query registered under `id`.
    ///
    /// `None` means the id was never issued or has already been resolved;
    /// the caller should discard whatever it was holding.
    pub fn resolve(&mut self, id: &CorrelationId) -> Option<PendingQuery<P>> {
        self.pending.remove(id)
    }

    /// The earliest deadline among outstanding queries.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(PendingQuery::deadline).min()
    }

    /// Removes and returns every query whose deadline is at or before `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<(CorrelationId, PendingQuery<P>)> {
        let due: Vec<CorrelationId> = self
            .pending
            .iter()
            .filter(|(_, q)| q.deadline() <= now)
            .map(|(id, _)| id.clone())
            .collect();
        due.into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|q| (id, q)))
            .collect()
    }

    /// Removes and returns every outstanding query, oldest first.
    pub fn drain(&mut self) -> Vec<(CorrelationId, PendingQuery<P>)> {
        let mut all: Vec<_> = self.pending.drain().collect();
        all.sort_by_key(|(_, q)| q.issued_at);
        all
    }

    /// Whether any outstanding query matches `pred`.
    pub fn any(&self, pred: impl Fn(&PendingQuery<P>) -> bool) -> bool {
        self.pending.values().any(pred)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_returns_slot_exactly_once() {
        let mut c = Correlator::new();
        let id = c.register(Command::GetUserInfo, Duration::from_secs(2), "slot");
        assert_eq!(c.len(), 1);

        let q = c.resolve(&id).expect("pending");
        assert_eq!(q.completion, "slot");
        assert_eq!(q.command, Command::GetUserInfo);
        assert!(c.resolve(&id).is_none(), "second resolve must miss");
        assert!(c.is_empty());
    }

    #[test]
    fn test_unknown_id_resolves_to_none() {
        let mut c = Correlator::<()>::new();
        assert!(c.resolve(&CorrelationId::from_raw("never-issued")).is_none());
    }

    #[test]
    fn test_ids_are_distinct() {
        let mut c = Correlator::new();
        let a = c.register(Command::Login, Duration::from_secs(1), 1);
        let b = c.register(Command::Login, Duration::from_secs(1), 2);
        assert_ne!(a, b);
        assert_eq!(c.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_takes_only_due_queries() {
        let mut c = Correlator::new();
        let short = c.register(Command::GetUserInfo, Duration::from_secs(2), "short");
        let long = c.register(Command::GetUserInfo, Duration::from_secs(10), "long");

        assert_eq!(c.next_deadline(), Some(Instant::now() + Duration::from_secs(2)));

        tokio::time::advance(Duration::from_secs(2)).await;
        let expired = c.expire(Instant::now());
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, short);
        assert_eq!(expired[0].1.completion, "short");

        // The expired id is gone; a late response finds nothing.
        assert!(c.resolve(&short).is_none());
        assert_eq!(c.next_deadline(), Some(Instant::now() + Duration::from_secs(8)));
        assert!(c.resolve(&long).is_some());
        assert_eq!(c.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_returns_everything_oldest_first() {
        let mut c = Correlator::new();
        c.register(Command::Login, Duration::from_secs(5), 1);
        tokio::time::advance(Duration::from_millis(10)).await;
        c.register(Command::GetUserInfo, Duration::from_secs(5), 2);

        let drained: Vec<i32> = c.drain().into_iter().map(|(_, q)| q.completion).collect();
        assert_eq!(drained, vec![1, 2]);
        assert!(c.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_never_expires() {
        let mut c = Correlator::new();
        let id = c.register(Command::GetUserInfo, Duration::MAX, "forever");
        c.register(Command::Login, Duration::from_secs(1), "soon");

        let far = c.next_deadline().expect("deadline");
        assert_eq!(far, Instant::now() + Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(86_400)).await;
        let expired = c.expire(Instant::now());
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].1.completion, "soon");
        assert!(c.next_deadline().expect("still pending") > Instant::now());
        assert!(c.resolve(&id).is_some());
    }

    #[test]
    fn test_any_matches_pending_commands() {
        let mut c = Correlator::new();
        c.register(Command::GetUserInfo, Duration::from_secs(1), ());
        assert!(c.any(|q| q.command == Command::GetUserInfo));
        assert!(!c.any(|q| q.command == Command::Login));
    }
}
