//! Growing waits between repeated attempts.
//!
//! A [`BackoffPolicy`] is plain configuration; [`Backoff`] is the running
//! state of one retry sequence. Callers that make progress between
//! attempts (a watch that delivered events before it closed) call
//! [`Backoff::reset`] so the next wait starts short again.

use std::time::Duration;

/// Bounds for a retry sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Wait before the first retry.
    pub first: Duration,
    /// No wait is ever longer than this.
    pub ceiling: Duration,
    /// Each wait is the previous one times this.
    pub factor: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            first: Duration::from_millis(250),
            ceiling: Duration::from_secs(30),
            factor: 2,
        }
    }
}

impl BackoffPolicy {
    /// Retry straight away, every time.
    pub fn immediate() -> Self {
        Self {
            first: Duration::ZERO,
            ceiling: Duration::ZERO,
            factor: 1,
        }
    }

    pub fn start(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            upcoming: self.first.min(self.ceiling),
            waits: 0,
        }
    }
}

/// Where a retry sequence currently stands.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    upcoming: Duration,
    waits: u32,
}

impl Backoff {
    /// The wait to apply now. Advances the sequence.
    pub fn next_wait(&mut self) -> Duration {
        let wait = self.upcoming;
        self.upcoming = wait
            .checked_mul(self.policy.factor)
            .unwrap_or(Duration::MAX)
            .min(self.policy.ceiling);
        self.waits += 1;
        wait
    }

    /// Progress was made; start over from the first wait.
    pub fn reset(&mut self) {
        self.upcoming = self.policy.first.min(self.policy.ceiling);
        self.waits = 0;
    }

    /// Waits handed out since the start or the last reset.
    pub fn waits(&self) -> u32 {
        self.waits
    }
}
