use async_trait::async_trait;
use std::time::Duration;

/// Store trait - abstraction over the shared counter/flag backend (Redis, in-memory).
///
/// Every limiter sharing a store shares its keys, so several server processes
/// pointed at one Redis enforce one global limit.
#[async_trait]
pub trait Store: Send + Sync {
    /// Atomically add one to the integer at `key`, creating it at 1 when absent.
    /// Returns the new value.
    ///
    /// Concurrent callers on the same key must never observe the same result.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Schedule removal of `key` after `ttl`. A missing key is a no-op.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Check whether `key` holds a live value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Set `key` to `value` expiring after `ttl`, replacing any previous value and expiry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
}

/// Store operation errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}
