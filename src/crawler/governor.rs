//! Global request-rate governor
//!
//! Every outbound request, whichever source it belongs to, first reserves a
//! slot here. Slots are handed out at least `interval` apart; the reservation
//! itself is a constant-time update under a fair lock, and the wait for the
//! slot happens after the lock is released.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Enforces a minimum spacing between any two outbound requests
pub struct RateGovernor {
    interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateGovernor {
    /// Creates a governor granting one request per `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_grant: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Reserves the next free slot and returns it without waiting
    ///
    /// Callers queue on the lock in FIFO order, so slots are granted in the
    /// order callers arrived.
    async fn reserve(&self) -> Instant {
        let mut last = self.last_grant.lock().await;
        let now = Instant::now();
        let slot = match *last {
            Some(previous) => (previous + self.interval).max(now),
            None => now,
        };
        *last = Some(slot);
        slot
    }

    /// Waits until the caller may issue a request
    ///
    /// Returns the instant the slot was granted for.
    pub async fn acquire(&self) -> Instant {
        let slot = self.reserve().await;
        tokio::time::sleep_until(slot).await;
        slot
    }

    /// Like [`RateGovernor::acquire`], but gives up when `shutdown` fires
    ///
    /// Returns `None` on shutdown. The reserved slot is not returned to the
    /// pool, which only delays other callers by at most one interval.
    pub async fn acquire_cancellable(&self, shutdown: &CancellationToken) -> Option<Instant> {
        let slot = tokio::select! {
            _ = shutdown.cancelled() => return None,
            slot = self.reserve() => slot,
        };
        tokio::select! {
            _ = shutdown.cancelled() => None,
            _ = tokio::time::sleep_until(slot) => Some(slot),
        }
    }
}
