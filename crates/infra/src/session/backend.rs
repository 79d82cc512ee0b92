use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("session backend error: {0}")]
pub struct BackendError(pub String);

/// Raw key-value operations the session cache needs from its store.
///
/// Implementations must be safe for concurrent use without external locking;
/// every operation is key-scoped and last-write-wins.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Write `value` under `key`, replacing any previous value and TTL.
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackendError>;

    /// Reset the TTL of an existing key. `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError>;

    async fn delete(&self, keys: &[String]) -> Result<(), BackendError>;

    async fn ping(&self) -> Result<(), BackendError>;
}
