//! Timeout enforcement.
//!
//! Every call that leaves the process (adapter call, store operation) runs
//! under a deadline. Expiry is a distinct error so callers can map it to
//! backend unavailability.

use std::future::Future;
use std::time::Duration;

/// The deadline passed before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct Elapsed(pub Duration);

/// Run `fut`, abandoning it once `deadline` has passed.
pub async fn with_deadline<F: Future>(deadline: Duration, fut: F) -> Result<F::Output, Elapsed> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| Elapsed(deadline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        assert_eq!(with_deadline(Duration::from_secs(1), async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_expires() {
        let slow = tokio::time::sleep(Duration::from_secs(5));
        let err = with_deadline(Duration::from_millis(10), slow).await.unwrap_err();
        assert_eq!(err, Elapsed(Duration::from_millis(10)));
    }
}
