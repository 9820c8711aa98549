//! Backoff delays and retry predicates

use crate::config::{RetryPolicy, RetryStrategy};
use crate::error::Error;
use rand::Rng;
use std::time::Duration;

/// Delay to wait after a failed `attempt` (1-indexed) before the next one
///
/// Capped at `max_delay_ms`; `jitter` adds up to 25% on top of the capped value.
///
/// ```rust
/// use satchel_core::config::{RetryPolicy, RetryStrategy};
/// use satchel_core::retry::calculate_delay;
///
/// let policy = RetryPolicy {
///     max_attempts: 3,
///     strategy: RetryStrategy::ExponentialBackoff,
///     backoff_multiplier: 2.0,
///     initial_delay_ms: 500,
///     max_delay_ms: 10_000,
/// };
/// assert_eq!(calculate_delay(&policy, 1, false).as_millis(), 500);
/// assert_eq!(calculate_delay(&policy, 3, false).as_millis(), 2000);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, jitter: bool) -> Duration {
    let index = attempt.saturating_sub(1);

    let base_ms = match policy.strategy {
        RetryStrategy::None => 0,
        RetryStrategy::FixedDelay => policy.initial_delay_ms,
        RetryStrategy::ExponentialBackoff => {
            (policy.initial_delay_ms as f64 * policy.backoff_multiplier.powf(index as f64)) as u64
        }
        RetryStrategy::LinearBackoff => policy.initial_delay_ms.saturating_mul(index as u64 + 1),
    };

    let capped_ms = base_ms.min(policy.max_delay_ms);

    let delay_ms = if jitter && capped_ms > 0 {
        capped_ms + rand::rng().random_range(0..=capped_ms / 4)
    } else {
        capped_ms
    };

    Duration::from_millis(delay_ms)
}

/// Decides whether an error is worth another attempt
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    fn should_retry(&self, error: &E) -> bool;
}

/// Retries every error
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// Retries only transient domain errors: transport failures and raw I/O errors
///
/// `NotFound`, `Unsupported` and everything else fail on the first attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientOnly;

impl RetryPredicate<Error> for TransientOnly {
    fn should_retry(&self, error: &Error) -> bool {
        matches!(error, Error::Transport { .. } | Error::Io(_))
    }
}
