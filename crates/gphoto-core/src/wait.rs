//! Bounded waiting with cancellation.
//!
//! Every long wait in gphoto (loopback callback, picker polling) goes through
//! [`bounded`], so timeouts and interrupts are reported the same way.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Result of racing a future against a timeout and a cancellation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Success(T),
    Timeout,
    Cancelled,
}

/// Waits for `source` for at most `timeout`, returning early on `cancel`.
///
/// Cancellation wins ties: a token that is already cancelled yields
/// [`WaitOutcome::Cancelled`] without polling `source`.
pub async fn bounded<F>(
    source: F,
    timeout: Duration,
    cancel: &CancellationToken,
) -> WaitOutcome<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => WaitOutcome::Cancelled,
        result = tokio::time::timeout(timeout, source) => match result {
            Ok(value) => WaitOutcome::Success(value),
            Err(_elapsed) => WaitOutcome::Timeout,
        },
    }
}
