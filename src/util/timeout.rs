//! Timeout helpers.

use std::future::Future;
use std::time::Duration;

use crate::error::ColloquyError;

/// Wrap a fallible future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, ColloquyError>>,
) -> Result<T, ColloquyError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ColloquyError::Timeout(duration.as_millis() as u64)),
    }
}

/// Await `future`, bounded by `limit` when one is given.
pub async fn maybe_timeout<T>(
    limit: Option<Duration>,
    future: impl Future<Output = T>,
) -> Result<T, ColloquyError> {
    match limit {
        Some(duration) => tokio::time::timeout(duration, future)
            .await
            .map_err(|_| ColloquyError::Timeout(duration.as_millis() as u64)),
        None => Ok(future.await),
    }
}
