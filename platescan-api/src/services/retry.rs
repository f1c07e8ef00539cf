//! Fixed-delay retry policy for external oracle calls
//!
//! Both the detector and OCR call sites share this policy object: a fixed
//! number of attempts with a constant inter-attempt delay. No backoff, no
//! jitter. Retries cover transport/availability failures only; callers must
//! not route content-absence outcomes through here.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Retry loop outcome when no attempt succeeded
#[derive(Debug, Error)]
pub enum RetryError<E: Display> {
    /// Every attempt failed; carries the final attempt's error
    #[error("Retries exhausted: {0}")]
    Exhausted(E),

    /// The caller cancelled the request mid-loop
    #[error("Operation cancelled")]
    Cancelled,
}

/// Fixed-attempt, fixed-delay retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent, waiting
    /// `delay` between failures. A success makes no further calls.
    /// Cancellation is observed before each attempt and during each delay.
    pub async fn run<F, Fut, T, E>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if cancel.is_cancelled() {
                tracing::debug!(operation, attempt, "Cancelled before attempt");
                return Err(RetryError::Cancelled);
            }

            match op().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(err) if attempt >= self.max_attempts => {
                    tracing::warn!(operation, attempt, error = %err, "Retries exhausted");
                    return Err(RetryError::Exhausted(err));
                }
                Err(err) => {
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %err,
                        "Attempt failed, retrying after delay"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                        _ = tokio::time::sleep(self.delay) => {}
                    }
                }
            }
        }
    }
}
