//! Redis-backed session backend.
//!
//! Uses a multiplexed `ConnectionManager`: one shared connection that is
//! cheap to clone per operation and reconnects on its own after an outage.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use super::backend::{BackendError, SessionBackend};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RedisSessionBackend {
    conn: ConnectionManager,
}

impl core::fmt::Debug for RedisSessionBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisSessionBackend").finish_non_exhaustive()
    }
}

impl RedisSessionBackend {
    /// Connect and PING once. Any failure here is a startup error.
    pub async fn connect(redis_url: impl AsRef<str>) -> Result<Self, BackendError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(redis_err)?;

        let conn = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| BackendError("redis connection timed out".to_string()))?
            .map_err(redis_err)?;

        let backend = Self { conn };
        tokio::time::timeout(CONNECT_TIMEOUT, backend.ping())
            .await
            .map_err(|_| BackendError("redis ping timed out".to_string()))??;

        info!("connected to redis session backend");
        Ok(backend)
    }
}

fn redis_err(e: redis::RedisError) -> BackendError {
    BackendError(e.to_string())
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl SessionBackend for RedisSessionBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(redis_err)
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(redis_err)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError> {
        let mut conn = self.conn.clone();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs(ttl))
            .query_async::<_, bool>(&mut conn)
            .await
            .map_err(redis_err)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), BackendError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys).await.map_err(redis_err)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(redis_err)
    }
}
