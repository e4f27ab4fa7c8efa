//! # Application Layer
//!
//! Async ports (interfaces), orchestrating use cases, and the parameter
//! validation applied at the tool-call boundary.

pub mod interfaces;
pub mod use_cases;
pub mod validation;

pub use interfaces::*;
pub use use_cases::*;
pub use validation::*;

use std::future::Future;
use std::time::Duration;

use crate::domain::AtlasError;

/// Default guard for one file's parse + embed work.
pub const DEFAULT_FILE_TIMEOUT_MS: u64 = 30_000;

/// Deadline wrapper around external calls; elapsing maps to
/// `AtlasError::Timeout`.
pub async fn with_timeout<T, F>(timeout_ms: u64, future: F) -> Result<T, AtlasError>
where
    F: Future<Output = Result<T, AtlasError>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => result,
        Err(_) => Err(AtlasError::Timeout(timeout_ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passthrough() {
        let result = with_timeout(1000, async { Ok::<_, AtlasError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let result = with_timeout(10, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, AtlasError>(42)
        })
        .await;
        assert!(matches!(result, Err(AtlasError::Timeout(10))));
    }
}
