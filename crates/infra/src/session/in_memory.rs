use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::backend::{BackendError, SessionBackend};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory session backend honouring TTLs.
///
/// Intended for tests/dev. Expired entries are removed lazily on access.
#[derive(Debug, Default)]
pub struct InMemorySessionBackend {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> BackendError {
        BackendError("lock poisoned".to_string())
    }
}

/// TTLs too large for the clock are clamped to roughly thirty years.
fn expiry(now: Instant, ttl: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[async_trait]
impl SessionBackend for InMemorySessionBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackendError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: expiry(Instant::now(), ttl),
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;

        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = expiry(now, ttl);
                Ok(true)
            }
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<(), BackendError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.entries.read().map(|_| ()).map_err(|_| Self::poisoned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let backend = InMemorySessionBackend::new();
        backend
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(!backend.expire("k", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn unrepresentable_ttl_is_clamped() {
        let backend = InMemorySessionBackend::new();
        backend.set_with_ttl("k", "v".to_string(), Duration::MAX).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(backend.expire("k", Duration::MAX).await.unwrap());
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expire_slides_the_window() {
        let backend = InMemorySessionBackend::new();
        backend
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(backend.expire("k", Duration::from_secs(10)).await.unwrap());

        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(backend.get("k").await.unwrap().is_some());
    }
}
