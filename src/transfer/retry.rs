//! # Retry controller
//!
//! Runs one logical request as up to `max_attempts` attempts. Only transient
//! failures (name resolution, connect, timeout, partial body) earn another
//! attempt; everything else is final at once.
//!
//! ```text
//! attempt 1 ── transient ──▶ sleep 1 unit ──▶ attempt 2 ── transient ──▶ sleep 2 units ──▶ attempt 3
//!     │                                           │                                           │
//!     └── ok / permanent ──▶ done                 └── ok / permanent ──▶ done                 └──▶ done
//! ```
//!
//! The stop flag is checked before every attempt after the first and while
//! sleeping, so a stop request never waits out a backoff.

use super::error::Error;
use super::progress::CancelFlag;
use core::fmt;
use core::time::Duration;
use log::warn;
use std::time::Instant;

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Failure classification used by [`Retry::run`].
pub trait Retryable {
    fn is_transient(&self) -> bool;
    /// The value reported when a stop request ends the loop.
    fn cancelled() -> Self;
}

impl Retryable for Error {
    fn is_transient(&self) -> bool {
        Error::is_transient(self)
    }

    fn cancelled() -> Self {
        Error::Cancelled
    }
}

/// Final result together with the number of attempts made.
#[derive(Debug, PartialEq, Eq)]
pub struct Outcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    max_attempts: u32,
    unit: Duration,
}

impl Retry {
    pub fn new(max_attempts: u32, unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            unit,
        }
    }

    /// Sleep after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt)
    }

    /// Calls `op` with the attempt number until it succeeds, fails
    /// permanently, or the attempts run out.
    pub fn run<T, E, F>(&self, cancel: &CancelFlag, mut op: F) -> Outcome<T, E>
    where
        E: Retryable + fmt::Debug,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            let result = op(attempt);
            let err = match result {
                Err(err) if err.is_transient() && attempt < self.max_attempts => err,
                result => {
                    return Outcome {
                        result,
                        attempts: attempt,
                    };
                }
            };

            let delay = self.delay(attempt);
            warn!(
                "attempt {}/{} failed: {:?}, retrying in {} ms",
                attempt,
                self.max_attempts,
                err,
                delay.as_millis()
            );
            if !sleep_unless_cancelled(delay, cancel) {
                return Outcome {
                    result: Err(E::cancelled()),
                    attempts: attempt,
                };
            }
            attempt += 1;
        }
    }
}

/// Returns `false` if the stop flag was raised before or during the sleep.
fn sleep_unless_cancelled(delay: Duration, cancel: &CancelFlag) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_requested() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
