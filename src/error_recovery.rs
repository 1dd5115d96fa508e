//! Bounded retries for transient sensor faults.
//
// Bus glitches (NACKs, DHT timing misses, checksum errors) are common on a
// single-board computer. Adapters retry them a few times inside one cycle;
// nothing is retried across cycles.

use crate::config::RetryConfig;
use crate::error::SensorError;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Boxed future returned by the `async_trait(?Send)` hardware methods.
pub type SensorFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SensorError>> + 'a>>;

/// Defines a policy for retrying an operation.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// The maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// The delay between attempts.
    pub backoff_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(RetryConfig::default())
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.attempts.max(1),
            backoff_delay: Duration::from_millis(config.delay_ms),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_delay: Duration::ZERO,
        }
    }
}

/// Runs `op` against `target` until it succeeds, fails with a non-transient
/// error, or the policy's attempts are used up.
///
/// Running out of attempts yields [`SensorError::Exhausted`] wrapping the last
/// error; a single-attempt policy returns the error unchanged.
pub async fn retry_transient<S, T, F>(
    target: &mut S,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, SensorError>
where
    S: ?Sized,
    F: for<'a> FnMut(&'a mut S) -> SensorFuture<'a, T>,
{
    let mut attempt = 1;
    loop {
        match op(target).await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= policy.max_attempts => {
                return Err(if attempt == 1 {
                    err
                } else {
                    SensorError::Exhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    }
                });
            }
            Err(err) => {
                debug!(attempt, error = %err, "transient sensor fault, retrying");
                sleep(policy.backoff_delay).await;
                attempt += 1;
            }
        }
    }
}
