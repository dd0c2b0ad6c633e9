//! Minimum-interval rate limiter shared by every request a client makes

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Enforces a minimum delay between consecutive requests
///
/// The limiter stores the earliest instant the next request may start.
/// `acquire` holds the lock while sleeping, so concurrent callers are
/// serialized and each one waits a full interval after the previous.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            next_allowed: Mutex::new(None),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Waits until a request may be sent, then reserves the next slot
    pub async fn acquire(&self) {
        let mut next_allowed = self.next_allowed.lock().await;

        if let Some(at) = *next_allowed {
            if at > Instant::now() {
                sleep_until(at).await;
            }
        }

        *next_allowed = Some(Instant::now() + self.min_delay);
    }

    /// Pushes the next allowed request at least `extra` into the future
    ///
    /// Never moves the next slot earlier than it already is.
    pub async fn cooldown(&self, extra: Duration) {
        let mut next_allowed = self.next_allowed.lock().await;
        let candidate = Instant::now() + extra;

        *next_allowed = Some(match *next_allowed {
            Some(at) if at > candidate => at,
            _ => candidate,
        });
    }
}
