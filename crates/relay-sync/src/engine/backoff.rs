//! Reconnect backoff
//!
//! First retry is immediate; subsequent delays double from the base up to
//! a ceiling. Reset on every successful connection.

use std::time::Duration;

/// Capped exponential backoff with an immediate first retry
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    ceiling: Duration,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff policy
    #[must_use]
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling,
            attempt: 0,
        }
    }

    /// Delay before the next attempt, advancing the attempt counter
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.attempt {
            0 => Duration::ZERO,
            n => {
                let factor = 2u32.saturating_pow(n - 1);
                self.base.saturating_mul(factor).min(self.ceiling)
            }
        };
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Reset after a successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
