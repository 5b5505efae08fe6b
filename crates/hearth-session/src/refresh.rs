//! Periodic user-info refresh timer.
//!
//! The timer only runs while the session is `Logged`. The worker calls
//! [`RefreshTimer::start`] on entering `Logged` and [`RefreshTimer::stop`]
//! on leaving it; [`RefreshTimer::wait`] sits in the worker's
//! `tokio::select!` and pends forever while stopped:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(req) = requests.recv() => { /* ... */ }
//!         _ = refresh.wait() => { /* send GETUSERINFO */ }
//!     }
//! }
//! ```
//!
//! A late wake-up never fires twice: the next tick is always scheduled one
//! interval after the tick that actually fired.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

use crate::correlator::deadline_after;

/// Fires every `interval` between `start` and `stop`.
#[derive(Debug)]
pub struct RefreshTimer {
    interval: Duration,
    next_tick: Option<Instant>,
    tick_count: u64,
}

impl RefreshTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: None,
            tick_count: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Starts counting from zero; the first tick is one interval from now.
    ///
    /// Calling it while running restarts the period.
    pub fn start(&mut self) {
        self.next_tick = Some(deadline_after(Instant::now(), self.interval));
        self.tick_count = 0;
        debug!(interval = ?self.interval, "refresh timer started");
    }

    /// Stops the timer. Idempotent.
    pub fn stop(&mut self) {
        if self.next_tick.take().is_some() {
            debug!(ticks = self.tick_count, "refresh timer stopped");
        }
    }

    /// Waits for the next tick and returns its number (starting at 1).
    ///
    /// Pends forever while stopped. Cancel-safe: dropping the future before
    /// it resolves leaves the schedule untouched.
    pub async fn wait(&mut self) -> u64 {
        let Some(next) = self.next_tick else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;
        self.next_tick = Some(deadline_after(now, self.interval));
        trace!(tick = self.tick_count, late = ?now.saturating_duration_since(next), "refresh tick");
        self.tick_count
    }
}
