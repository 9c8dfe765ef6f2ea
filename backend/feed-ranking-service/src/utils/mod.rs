// Utility functions for feed-ranking-service

use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Outcome of a bounded call to an external accessor.
#[derive(Debug, thiserror::Error)]
pub enum BoundedCallError {
    #[error("operation timed out after {0:?}")]
    Elapsed(Duration),
    #[error("operation failed: {0}")]
    Failed(String),
}

impl BoundedCallError {
    pub fn outcome_label(&self) -> &'static str {
        match self {
            BoundedCallError::Elapsed(_) => "timeout",
            BoundedCallError::Failed(_) => "error",
        }
    }
}

/// Run a fallible accessor call under a deadline.
pub async fn with_deadline<F, T, E>(duration: Duration, future: F) -> Result<T, BoundedCallError>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match timeout(duration, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(BoundedCallError::Failed(e.to_string())),
        Err(_) => Err(BoundedCallError::Elapsed(duration)),
    }
}

/// Stable per-session shuffle key: the same `(seed, id)` always maps to the
/// same position, independent of which other ids are in the bucket.
pub fn shuffle_key(seed: u64, id: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_be_bytes());
    hasher.update(id.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}
