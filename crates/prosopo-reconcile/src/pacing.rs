//! Request pacing
//!
//! Enforces a minimum interval between external calls. Implemented as a
//! shared slot reservation rather than ad-hoc sleeps so that a caller
//! awaiting its slot can still be cancelled promptly between calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum-interval rate limiter for external calls.
pub struct Pacer {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    /// Create a pacer with the given minimum interval between calls
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait until the next call slot is available.
    ///
    /// Reserves the slot before sleeping, so concurrent callers line up
    /// one interval apart instead of racing through together.
    pub async fn wait(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let at = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(at + self.min_interval);
            at
        };
        tokio::time::sleep_until(slot).await;
    }
}
