//! Fixed-interval polling bounded by a deadline.
//!
//! A probe phase checks its condition once immediately and then once per
//! interval until the deadline. The last sleep is clamped to the deadline, so
//! a phase never runs longer than `timeout + interval` even when a single check
//! is slow.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Poller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            // A zero interval would spin without yielding.
            interval: interval.max(Duration::from_millis(1)),
            timeout,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Evaluate `check` now, then once per interval, until it yields a value
    /// or the deadline passes. `Ok(None)` means it never did. An error from
    /// `check` ends the loop immediately.
    pub async fn until<T, E>(
        &self,
        mut check: impl AsyncFnMut() -> Result<Option<T>, E>,
    ) -> Result<Option<T>, E> {
        let mut clock = self.start();
        loop {
            if let Some(value) = check().await? {
                return Ok(Some(value));
            }
            if !clock.tick().await {
                debug!(
                    "condition not met after {} attempts ({}ms)",
                    clock.attempts(),
                    clock.elapsed().as_millis()
                );
                return Ok(None);
            }
        }
    }

    /// Evaluate `check` now and once per interval through the whole window.
    /// Returns the last value when every evaluation yielded one, and
    /// `Ok(None)` as soon as one did not.
    pub async fn hold<T, E>(
        &self,
        mut check: impl AsyncFnMut() -> Result<Option<T>, E>,
    ) -> Result<Option<T>, E> {
        let mut clock = self.start();
        loop {
            let Some(value) = check().await? else {
                debug!("condition lapsed on attempt {}", clock.attempts());
                return Ok(None);
            };
            if !clock.tick().await {
                return Ok(Some(value));
            }
        }
    }

    /// Start the clock for one phase.
    pub fn start(&self) -> PollLoop {
        let started = Instant::now();
        PollLoop {
            interval: self.interval,
            started,
            deadline: started + self.timeout,
            attempts: 1,
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(
            DEFAULT_POLL_INTERVAL,
            Duration::from_millis(sonde_common::capability::DEFAULT_TIMEOUT_MS),
        )
    }
}

/// Clock for a single poll loop. The first attempt is implicit; call
/// [`PollLoop::tick`] before every further attempt.
#[derive(Debug)]
pub struct PollLoop {
    interval: Duration,
    started: Instant,
    deadline: Instant,
    attempts: u32,
}

impl PollLoop {
    /// Wait for the next attempt. Returns `false` once the deadline has passed,
    /// meaning the caller should give up.
    pub async fn tick(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let wait = self.interval.min(self.deadline - now);
        tokio::time::sleep(wait).await;
        self.attempts += 1;
        true
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
