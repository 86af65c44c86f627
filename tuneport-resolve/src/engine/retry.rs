//! Single-retry policy for catalog calls
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. Success, or a non-retryable error (auth, rejected query): return it
//! 3. Retryable error: log WARN, wait (catalog hint for rate limits, fixed
//!    backoff otherwise), attempt once more
//! 4. Second failure: return it; the caller abandons the strategy
//!
//! Both the attempts and the wait race the cancellation token, so shutdown
//! never blocks on an in-flight request.

use crate::error::CatalogError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of a cancellable operation
#[derive(Debug, PartialEq)]
pub enum Attempt<T> {
    Done(T),
    Cancelled,
}

pub async fn retry_once<F, Fut, T>(
    operation_name: &str,
    backoff: Duration,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<Attempt<T>, CatalogError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CatalogError>>,
{
    let first = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(Attempt::Cancelled),
        result = operation() => result,
    };

    let err = match first {
        Ok(value) => return Ok(Attempt::Done(value)),
        Err(err) if !err.is_retryable() => return Err(err),
        Err(err) => err,
    };

    let delay = err.retry_delay(backoff);
    tracing::warn!(
        operation = operation_name,
        delay_ms = delay.as_millis() as u64,
        error = %err,
        "Catalog call failed, retrying once"
    );

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(Attempt::Cancelled),
        _ = tokio::time::sleep(delay) => {}
    }

    let second = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(Attempt::Cancelled),
        result = operation() => result,
    };

    match second {
        Ok(value) => {
            tracing::debug!(operation = operation_name, "Catalog call succeeded after retry");
            Ok(Attempt::Done(value))
        }
        Err(err) => {
            tracing::warn!(
                operation = operation_name,
                error = %err,
                "Catalog call failed after retry"
            );
            Err(err)
        }
    }
}
