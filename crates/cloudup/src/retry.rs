//! Bounded exponential-backoff retry for single cloud operations.
//!
//! Every provider call is wrapped in [`retry_with_backoff`]. The operation
//! reports the outcome of each attempt as an [`Attempt`]:
//!
//! - [`Attempt::Done`] stops with success.
//! - [`Attempt::Retry`] sleeps and tries again. A carried error is surfaced
//!   if the policy runs out of steps; without one the result is
//!   [`CloudupError::WaitTimeout`].
//! - [`Attempt::Fatal`] stops and propagates the error immediately.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{CloudupError, Result};

/// Backoff policy for one call site role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the second attempt.
    pub duration: Duration,
    /// Multiplier applied to the delay after every sleep.
    pub factor: f64,
    /// Each sleep is lengthened by up to `jitter * delay`.
    pub jitter: f64,
    /// Maximum number of attempts.
    pub steps: u32,
}

/// Policy for Get/List calls.
pub const READ_BACKOFF: Backoff = Backoff {
    duration: Duration::from_secs(1),
    factor: 1.5,
    jitter: 0.1,
    steps: 4,
};

/// Policy for Create calls.
pub const WRITE_BACKOFF: Backoff = Backoff {
    duration: Duration::from_secs(1),
    factor: 1.5,
    jitter: 0.1,
    steps: 5,
};

/// Policy for Delete calls, which poll until the resource is gone.
pub const DELETE_BACKOFF: Backoff = Backoff {
    duration: Duration::from_secs(1),
    factor: 1.5,
    jitter: 0.1,
    steps: 20,
};

/// Policy for pool membership updates, which can hit a pool in a transitional
/// immutable state.
pub const MEMBER_BACKOFF: Backoff = Backoff {
    duration: Duration::from_secs(1),
    factor: 2.0,
    jitter: 0.1,
    steps: 10,
};

impl Backoff {
    /// Upper bound of the total time spent sleeping, ignoring jitter.
    #[must_use]
    pub fn max_total_delay(&self) -> Duration {
        let mut delay = self.duration;
        let mut total = Duration::ZERO;
        for _ in 1..self.steps {
            total = total.saturating_add(delay);
            delay = self.next_delay(delay);
        }
        total
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.factor).unwrap_or(delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let extra = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        delay.saturating_add(Duration::try_from_secs_f64(extra).unwrap_or(Duration::ZERO))
    }
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The operation completed.
    Done(T),
    /// Transient failure; try again after the next delay.
    Retry(Option<CloudupError>),
    /// Failure that no retry can fix.
    Fatal(CloudupError),
}

impl<T> Attempt<T> {
    /// Classify an error: permanent errors are fatal, everything else is retried.
    #[must_use]
    pub fn from_error(err: CloudupError) -> Self {
        if err.is_permanent() {
            Self::Fatal(err)
        } else {
            Self::Retry(Some(err))
        }
    }
}

/// Run `operation` until it reports done, fails fatally, or `backoff` runs out.
///
/// # Errors
/// Returns the fatal error, the last retryable error once attempts are
/// exhausted, [`CloudupError::WaitTimeout`] if no attempt carried an error, or
/// [`CloudupError::Cancelled`] when `cancel` fires.
pub async fn retry_with_backoff<T, F, Fut>(
    backoff: &Backoff,
    cancel: &CancellationToken,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut delay = backoff.duration;
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let sleep_for = backoff.jittered(delay);
            tokio::select! {
                () = cancel.cancelled() => return Err(CloudupError::Cancelled),
                () = tokio::time::sleep(sleep_for) => {}
            }
            delay = backoff.next_delay(delay);
        }
        if cancel.is_cancelled() {
            return Err(CloudupError::Cancelled);
        }
        attempt += 1;

        let last_error = match operation().await {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fatal(err) => return Err(err),
            Attempt::Retry(err) => err,
        };

        if attempt >= backoff.steps {
            warn!(
                operation = operation_name,
                attempts = attempt,
                error = ?last_error,
                "Hit maximum retries"
            );
            return Err(last_error.unwrap_or(CloudupError::WaitTimeout));
        }

        if let Some(err) = &last_error {
            debug!(
                operation = operation_name,
                attempt,
                max_attempts = backoff.steps,
                error = %err,
                "Retrying after error"
            );
        }
    }
}
