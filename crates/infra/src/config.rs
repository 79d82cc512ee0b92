//! Process configuration loaded from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::jobs::BackgroundQueueConfig;
use crate::session::SessionCacheConfig;

const DEV_JWT_SECRET: &str = "dev-secret";

/// Upper bound for every duration setting; keeps deadlines and TTLs
/// representable as instants.
const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;
const MAX_QUEUE_CAPACITY: u64 = 1 << 20;
const MAX_CONCURRENCY: u64 = 1 << 16;
const MAX_LOGIN_ATTEMPTS: u64 = 1 << 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{key} must be at most {max}")]
    TooLarge { key: &'static str, max: u64 },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Deadline propagated to token verification and directory lookups.
    pub request_timeout: Duration,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

impl AuthConfig {
    /// True when no JWT_SECRET was provided and the insecure default is active.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub redis_url: String,
}

/// Fixed-window limit on login attempts per client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginRateLimit {
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for LoginRateLimit {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub session: SessionCacheConfig,
    pub stores: StoreConfig,
    pub background: BackgroundQueueConfig,
    pub login_rate_limit: LoginRateLimit,
    pub log_json: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, test fixtures).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let jwt_secret = match env.raw("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => DEV_JWT_SECRET.to_string(),
        };

        let use_persistent_stores = env.parse("USE_PERSISTENT_STORES", false)?;
        let database_url = env.raw("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            server: ServerConfig {
                addr: env.parse("SERVER_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
                request_timeout: env.secs("REQUEST_TIMEOUT_SECS", 10)?,
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl: env.secs("TOKEN_TTL_SECS", 24 * 60 * 60)?,
            },
            session: SessionCacheConfig {
                ttl: env.secs("SESSION_TTL_SECS", 24 * 60 * 60)?,
                op_timeout: env.millis("CACHE_TIMEOUT_MS", 2_000)?,
            },
            stores: StoreConfig {
                use_persistent_stores,
                database_url,
                db_max_connections: env.parse("DB_MAX_CONNECTIONS", 10)?,
                redis_url: env
                    .raw("REDIS_URL")
                    .unwrap_or_else(|| "redis://localhost:6379".to_string()),
            },
            background: BackgroundQueueConfig::default()
                .with_name("session-background")
                .with_capacity(env.bounded("BACKGROUND_QUEUE_CAPACITY", 1024, MAX_QUEUE_CAPACITY)? as usize)
                .with_concurrency(env.bounded("BACKGROUND_CONCURRENCY", 16, MAX_CONCURRENCY)? as usize)
                .with_task_timeout(env.millis("BACKGROUND_TASK_TIMEOUT_MS", 5_000)?),
            login_rate_limit: LoginRateLimit {
                max_attempts: env.bounded("LOGIN_RATE_LIMIT", 5, MAX_LOGIN_ATTEMPTS)? as u32,
                window: env.secs("LOGIN_RATE_WINDOW_SECS", 60)?,
            },
            log_json: env.parse("LOG_JSON", true)?,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.raw(key) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
            None => Ok(default),
        }
    }

    fn bounded(&self, key: &'static str, default: u64, max: u64) -> Result<u64, ConfigError> {
        match self.parse(key, default)? {
            0 => Err(ConfigError::Zero(key)),
            n if n > max => Err(ConfigError::TooLarge { key, max }),
            n => Ok(n),
        }
    }

    fn secs(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        self.bounded(key, default, MAX_DURATION_SECS).map(Duration::from_secs)
    }

    fn millis(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        self.bounded(key, default, MAX_DURATION_SECS * 1_000).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_a_dev_deployment() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.server.addr.port(), 8080);
        assert_eq!(cfg.session.ttl, Duration::from_secs(86_400));
        assert_eq!(cfg.session.op_timeout, Duration::from_secs(2));
        assert_eq!(cfg.auth.token_ttl, Duration::from_secs(86_400));
        assert_eq!(cfg.auth.jwt_secret, DEV_JWT_SECRET);
        assert!(cfg.auth.uses_dev_secret());
        assert!(!cfg.stores.use_persistent_stores);
        assert!(cfg.log_json);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = load(&[
            ("JWT_SECRET", "s3cret"),
            ("SESSION_TTL_SECS", "60"),
            ("CACHE_TIMEOUT_MS", "250"),
            ("BACKGROUND_CONCURRENCY", "4"),
            ("LOG_JSON", "false"),
        ])
        .unwrap();
        assert_eq!(cfg.auth.jwt_secret, "s3cret");
        assert_eq!(cfg.session.ttl, Duration::from_secs(60));
        assert_eq!(cfg.session.op_timeout, Duration::from_millis(250));
        assert_eq!(cfg.background.concurrency, 4);
        assert!(!cfg.log_json);
    }

    #[test]
    fn invalid_values_fail_fast() {
        assert!(matches!(
            load(&[("SESSION_TTL_SECS", "a day")]),
            Err(ConfigError::Invalid { key: "SESSION_TTL_SECS", .. })
        ));
        assert_eq!(
            load(&[("CACHE_TIMEOUT_MS", "0")]).unwrap_err(),
            ConfigError::Zero("CACHE_TIMEOUT_MS")
        );
    }

    #[test]
    fn oversized_values_are_rejected() {
        assert_eq!(
            load(&[("REQUEST_TIMEOUT_SECS", "18446744073709551615")]).unwrap_err(),
            ConfigError::TooLarge {
                key: "REQUEST_TIMEOUT_SECS",
                max: MAX_DURATION_SECS
            }
        );
        assert!(matches!(
            load(&[("SESSION_TTL_SECS", "100000000000")]),
            Err(ConfigError::TooLarge { key: "SESSION_TTL_SECS", .. })
        ));
        assert!(matches!(
            load(&[("BACKGROUND_CONCURRENCY", "4294967296")]),
            Err(ConfigError::TooLarge { key: "BACKGROUND_CONCURRENCY", .. })
        ));

        let at_limit = MAX_DURATION_SECS.to_string();
        let cfg = load(&[("REQUEST_TIMEOUT_SECS", at_limit.as_str())]).unwrap();
        assert_eq!(cfg.server.request_timeout, Duration::from_secs(MAX_DURATION_SECS));
    }

    #[test]
    fn login_rate_limit_defaults_and_overrides() {
        assert_eq!(load(&[]).unwrap().login_rate_limit, LoginRateLimit::default());

        let cfg = load(&[("LOGIN_RATE_LIMIT", "20"), ("LOGIN_RATE_WINDOW_SECS", "300")]).unwrap();
        assert_eq!(cfg.login_rate_limit.max_attempts, 20);
        assert_eq!(cfg.login_rate_limit.window, Duration::from_secs(300));
    }

    #[test]
    fn persistent_stores_require_database_url() {
        assert_eq!(
            load(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        assert!(load(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/career_link"),
        ])
        .is_ok());
    }

    #[test]
    fn secret_is_redacted_from_debug_output() {
        let cfg = load(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert!(!format!("{cfg:?}").contains("s3cret"));
    }
}
