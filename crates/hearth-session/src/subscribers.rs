//! Explicit publish/subscribe lists.
//!
//! Each notification kind (state changes, user updates, unsolicited
//! events) has its own [`Subscribers`] list. The worker publishes; the UI
//! holds [`Subscription`]s and drains them on its own execution context.
//! Delivery is in publish order, per subscriber.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

/// Ids are unique across every list in the process, so a single
/// `unsubscribe(id)` can be routed to whichever list owns it.
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registry<T> {
    senders: Vec<(SubscriptionId, mpsc::UnboundedSender<T>)>,
}

/// A list of subscribers for notifications of type `T`.
pub struct Subscribers<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                senders: Vec::new(),
            })),
        }
    }

    // A panic while holding the lock cannot leave the Vec half-updated,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Subscription<T> {
        let id = SubscriptionId(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().senders.push((id, tx));
        Subscription {
            id,
            rx,
            list: self.clone(),
        }
    }

    /// Removes a subscriber. Returns `false` if `id` is not in this list.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.lock();
        let before = registry.senders.len();
        registry.senders.retain(|(sid, _)| *sid != id);
        registry.senders.len() != before
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.lock().senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Subscribers<T> {
    /// Delivers `value` to every subscriber, forgetting the ones whose
    /// receiving side is gone.
    pub fn publish(&self, value: &T) {
        self.lock()
            .senders
            .retain(|(_, tx)| tx.send(value.clone()).is_ok());
    }
}

/// The receiving side of one registration.
///
/// Dropping it unregisters the subscriber.
pub struct Subscription<T> {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<T>,
    list: Subscribers<T>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next notification. Returns `None` once the
    /// subscriber has been unregistered and everything queued is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Takes the next queued notification without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.list.unsubscribe(self.id);
    }
}
