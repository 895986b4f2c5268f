//! Retry with exponential backoff and optional jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::ColloquyError;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Scale each wait by a random 75%–125%.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy for throttled completion requests: 5 s, doubling, capped at 60 s.
    pub fn throttling() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// Execute an async operation, retrying errors that are retryable.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, ColloquyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ColloquyError>>,
    {
        self.execute_if(ColloquyError::is_retryable, operation).await
    }

    /// Execute an async operation, retrying only errors matching `should_retry`.
    ///
    /// A `retry_after` hint on a throttling error is honored when it is
    /// longer than the computed backoff. Exhaustion returns the last error.
    pub async fn execute_if<P, F, Fut, T>(
        &self,
        should_retry: P,
        mut operation: F,
    ) -> Result<T, ColloquyError>
    where
        P: Fn(&ColloquyError) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ColloquyError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !should_retry(&e) || attempt >= max_attempts {
                        return Err(e);
                    }

                    let wait = self.wait_for(backoff, &e);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Retrying after error"
                    );
                    tokio::time::sleep(wait).await;

                    backoff = Duration::from_secs_f64(
                        (backoff.as_secs_f64() * self.multiplier)
                            .min(self.max_backoff.as_secs_f64()),
                    );
                }
            }
        }
    }

    fn wait_for(&self, backoff: Duration, error: &ColloquyError) -> Duration {
        let computed = if self.jitter {
            // 75%–125% of backoff
            let jitter_factor = 0.75 + (rand_factor() * 0.5);
            Duration::from_secs_f64(backoff.as_secs_f64() * jitter_factor)
        } else {
            backoff
        };
        match error {
            ColloquyError::RateLimited {
                retry_after_ms: Some(ms),
            } => computed.max(Duration::from_millis(*ms)),
            _ => computed,
        }
    }
}

/// Simple pseudo-random factor [0, 1) without pulling in rand crate.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    let hash = hasher.finish();
    (hash % 10000) as f64 / 10000.0
}
