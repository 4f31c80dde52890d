//! Bounded retry of blocking operations.

use std::time::Duration;

use tracing::{debug, warn};

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay multiplied after every failed attempt, capped at `max`.
    Exponential { multiplier: f64, max: Duration },
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// An attempt succeeded.
    Succeeded { value: T, attempts: u32 },
    /// Every attempt failed.
    Exhausted { attempts: u32, last_error: E },
}

impl<T, E> RetryOutcome<T, E> {
    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Returns true if an attempt succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Converts into a `Result`, dropping the attempt count.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::Exhausted { last_error, .. } => Err(last_error),
        }
    }
}

/// Retry settings for one operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Creates a fixed-delay policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Fixed,
        }
    }

    /// Sets the backoff strategy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { multiplier, max } => {
                let factor = multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
                Duration::from_secs_f64(self.delay.as_secs_f64() * factor).min(max)
            },
        }
    }

    /// Runs `op` until it succeeds or the attempts run out.
    ///
    /// `op` receives the 1-based attempt number. Between attempts the calling
    /// thread sleeps, so this belongs on a blocking worker.
    pub fn run<T, E, F>(&self, mut op: F) -> RetryOutcome<T, E>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    debug!("Attempt {}/{} succeeded", attempt, self.max_attempts);
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    };
                },
                Err(e) if attempt >= self.max_attempts => {
                    warn!(
                        "Attempt {}/{} failed, giving up: {}",
                        attempt, self.max_attempts, e
                    );
                    return RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    };
                },
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "Attempt {}/{} failed, retrying in {:?}: {}",
                        attempt, self.max_attempts, delay, e
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                },
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            reposync_core::DEFAULT_MAX_RETRIES,
            Duration::from_millis(reposync_core::DEFAULT_RETRY_DELAY_MS),
        )
    }
}
