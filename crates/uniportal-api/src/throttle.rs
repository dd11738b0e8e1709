// Per-connection request pacing.
//
// A plain minimum-spacing throttle: before each request, wait out whatever
// remains of the floor since the previous one. It serializes pacing for a
// single connection only; separate connections never wait on each other.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::clock::SharedClock;

/// Minimum spacing between two requests on one connection.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request_at: Option<Instant>,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, clock: SharedClock) -> Self {
        Self {
            min_interval,
            last_request_at: None,
            clock,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_request_at(&self) -> Option<Instant> {
        self.last_request_at
    }

    /// Wait until the floor has elapsed, then stamp the request time.
    ///
    /// Returns how long the caller was held back.
    pub async fn acquire(&mut self) -> Duration {
        let wait = self.remaining();
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis(), "pacing request");
            self.clock.sleep(wait).await;
        }
        self.mark();
        wait
    }

    /// Stamp "now" as the last request time without waiting.
    pub fn mark(&mut self) {
        self.last_request_at = Some(self.clock.now());
    }

    /// Time left before the next request may go out.
    pub fn remaining(&self) -> Duration {
        self.last_request_at.map_or(Duration::ZERO, |last| {
            let elapsed = self.clock.now().saturating_duration_since(last);
            self.min_interval.saturating_sub(elapsed)
        })
    }
}
