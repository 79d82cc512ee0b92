//! Cache-aside session store keyed by principal id.
//!
//! The cache only accelerates the user directory; it is never the source of
//! truth. Entries may be stale for up to their remaining TTL. Any backend
//! failure on the read path degrades to a miss.

pub mod backend;
pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use careerlink_auth::{AdminProfile, Identity, Principal, PrincipalId, Role};

use crate::jobs::BackgroundQueue;

pub use backend::{BackendError, SessionBackend};
pub use in_memory::InMemorySessionBackend;
#[cfg(feature = "redis")]
pub use redis_store::RedisSessionBackend;

/// Namespaced cache key. One namespace per snapshot kind, both keyed by
/// principal id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SessionKey {
    Principal(PrincipalId),
    AdminProfile(PrincipalId),
}

impl SessionKey {
    pub fn namespace(&self) -> &'static str {
        match self {
            SessionKey::Principal(_) => "session",
            SessionKey::AdminProfile(_) => "admin",
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        match self {
            SessionKey::Principal(id) | SessionKey::AdminProfile(id) => *id,
        }
    }
}

impl core::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.namespace(), self.principal_id())
    }
}

#[derive(Debug, Clone)]
pub struct SessionCacheConfig {
    /// Sliding window applied on every write and hit.
    pub ttl: Duration,
    /// Fixed bound on each backend call, independent of request deadlines.
    pub op_timeout: Duration,
}

impl Default for SessionCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            op_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionCacheError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("session cache {0} timed out")]
    Timeout(&'static str),

    #[error("failed to encode session snapshot: {0}")]
    Encode(String),
}

#[derive(Clone)]
pub struct SessionCache {
    backend: Arc<dyn SessionBackend>,
    config: SessionCacheConfig,
    background: BackgroundQueue,
}

impl core::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionCache {
    pub fn new(backend: Arc<dyn SessionBackend>, config: SessionCacheConfig, background: BackgroundQueue) -> Self {
        Self {
            backend,
            config,
            background,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Overwrite the snapshot for this identity (principal and, for admins,
    /// the admin profile).
    pub async fn store(&self, identity: &Identity, ttl: Duration) -> Result<(), SessionCacheError> {
        let id = identity.id();
        let principal_json = encode(identity.principal())?;
        bounded(
            self.config.op_timeout,
            "store",
            self.backend
                .set_with_ttl(&SessionKey::Principal(id).to_string(), principal_json, ttl),
        )
        .await?;

        if let Some(admin) = identity.admin() {
            let admin_json = encode(admin)?;
            bounded(
                self.config.op_timeout,
                "store",
                self.backend
                    .set_with_ttl(&SessionKey::AdminProfile(id).to_string(), admin_json, ttl),
            )
            .await?;
        }

        Ok(())
    }

    /// Read path. A hit schedules a TTL refresh and returns immediately; any
    /// failure or inconsistent snapshot is reported as a miss.
    pub async fn lookup(&self, id: PrincipalId) -> Option<Identity> {
        match self.try_lookup(id).await {
            Ok(Some(identity)) => {
                self.refresh_in_background(&identity);
                Some(identity)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(principal_id = %id, error = %e, "session cache unavailable, treating as miss");
                None
            }
        }
    }

    async fn try_lookup(&self, id: PrincipalId) -> Result<Option<Identity>, SessionCacheError> {
        let key = SessionKey::Principal(id);
        let Some(principal) = self.get_snapshot::<Principal>(key).await? else {
            return Ok(None);
        };

        let admin = if principal.role == Role::Admin {
            let admin_key = SessionKey::AdminProfile(id);
            match self.get_snapshot::<AdminProfile>(admin_key).await? {
                Some(admin) => Some(admin),
                None => {
                    debug!(key = %admin_key, "admin profile missing from cache");
                    return Ok(None);
                }
            }
        } else {
            None
        };

        match Identity::new(principal, admin) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                debug!(key = %key, error = %e, "inconsistent session snapshot");
                Ok(None)
            }
        }
    }

    async fn get_snapshot<T: DeserializeOwned>(&self, key: SessionKey) -> Result<Option<T>, SessionCacheError> {
        let raw = bounded(self.config.op_timeout, "lookup", self.backend.get(&key.to_string())).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "undecodable session snapshot");
                Ok(None)
            }
        }
    }

    /// Delete both namespace entries for a principal (logout).
    pub async fn invalidate(&self, id: PrincipalId) -> Result<(), SessionCacheError> {
        let keys = vec![
            SessionKey::Principal(id).to_string(),
            SessionKey::AdminProfile(id).to_string(),
        ];
        bounded(self.config.op_timeout, "invalidate", self.backend.delete(&keys)).await
    }

    /// Queue a cache write for an identity resolved from the directory.
    pub fn populate_in_background(&self, identity: Identity) {
        let cache = self.clone();
        let id = identity.id();
        let ttl = self.config.ttl;

        let submitted = self.background.submit("session.populate", async move {
            cache.store(&identity, ttl).await?;
            debug!(principal_id = %id, "session cache populated");
            Ok(())
        });

        if let Err(e) = submitted {
            warn!(principal_id = %id, error = %e, "session populate not scheduled");
        }
    }

    fn refresh_in_background(&self, identity: &Identity) {
        let id = identity.id();
        let mut keys = vec![SessionKey::Principal(id)];
        if identity.admin().is_some() {
            keys.push(SessionKey::AdminProfile(id));
        }

        let backend = self.backend.clone();
        let ttl = self.config.ttl;
        let op_timeout = self.config.op_timeout;

        let submitted = self.background.submit("session.refresh", async move {
            for key in keys {
                bounded(op_timeout, "refresh", backend.expire(&key.to_string(), ttl)).await?;
            }
            Ok(())
        });

        if let Err(e) = submitted {
            debug!(principal_id = %id, error = %e, "session refresh not scheduled");
        }
    }

    pub async fn ping(&self) -> Result<(), SessionCacheError> {
        bounded(self.config.op_timeout, "ping", self.backend.ping()).await
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, SessionCacheError> {
    serde_json::to_string(value).map_err(|e| SessionCacheError::Encode(e.to_string()))
}

async fn bounded<T>(
    timeout: Duration,
    op: &'static str,
    fut: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, SessionCacheError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(SessionCacheError::from),
        Err(_) => Err(SessionCacheError::Timeout(op)),
    }
}
