//! Bounded retry with a fixed delay.
//!
//! The policy is a plain value; what counts as success, a retryable failure,
//! or a fatal one is decided per call by a classification closure.

use std::fmt;
use std::time::Duration;

use mountat_common::config::RetryConfig;
use thiserror::Error;

/// How a failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Sleep for the interval and try again, if attempts remain.
    Retry,
    /// The error means the desired state already holds.
    Settled,
    /// Give up immediately.
    Fatal,
}

/// Why a retried operation did not succeed.
#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Display + fmt::Debug> {
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error returned by the final attempt.
        last: E,
    },
    /// An attempt failed with an error classified as fatal.
    #[error("fatal error on attempt {attempt}: {error}")]
    Fatal {
        /// Attempt that failed (1-based).
        attempt: u32,
        /// Error returned by that attempt.
        error: E,
    },
}

/// How the operation ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The operation itself succeeded on the given attempt.
    Succeeded(u32),
    /// The operation returned an error classified as settled on the given
    /// attempt.
    AlreadySettled(u32),
}

/// Fixed-interval retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            interval: config.interval(),
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, settles, fails fatally, or the attempt
    /// bound is reached.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Fatal`] on a fatal classification and
    /// [`RetryError::Exhausted`] once `max_attempts` retryable failures
    /// have been observed.
    pub fn run<E, F, C>(&self, mut op: F, classify: C) -> Result<Settlement, RetryError<E>>
    where
        E: fmt::Display + fmt::Debug,
        F: FnMut() -> Result<(), E>,
        C: Fn(&E) -> Classification,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match op() {
                Ok(()) => return Ok(Settlement::Succeeded(attempt)),
                Err(e) => e,
            };
            match classify(&error) {
                Classification::Settled => return Ok(Settlement::AlreadySettled(attempt)),
                Classification::Fatal => return Err(RetryError::Fatal { attempt, error }),
                Classification::Retry if attempt >= max_attempts => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }
                Classification::Retry => {
                    tracing::trace!(attempt, %error, "retrying");
                    std::thread::sleep(self.interval);
                    attempt += 1;
                }
            }
        }
    }
}
