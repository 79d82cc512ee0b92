use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use careerlink_auth::TokenService;
use careerlink_infra::directory::{InMemoryUserDirectory, PostgresUserDirectory};
use careerlink_infra::session::{InMemorySessionBackend, RedisSessionBackend, SessionBackend};
use careerlink_infra::{AppConfig, BackgroundQueue, BackgroundQueueHandle, SessionCache, UserDirectory};

use crate::app::metrics::LoginMetrics;
use crate::middleware::AuthState;
use crate::rate_limit::RateLimiter;

/// Everything the handlers and middleware share.
#[derive(Clone)]
pub struct AppServices {
    pub tokens: Arc<TokenService>,
    pub sessions: SessionCache,
    pub directory: Arc<dyn UserDirectory>,
    pub background: BackgroundQueue,
    pub token_ttl: chrono::Duration,
    pub request_timeout: Duration,
    pub login_limiter: RateLimiter,
    pub login_metrics: Arc<LoginMetrics>,
}

impl AppServices {
    /// Wire services around an in-memory session store and the given
    /// directory. Used by dev runs and tests.
    pub fn in_memory(
        config: &AppConfig,
        directory: Arc<InMemoryUserDirectory>,
    ) -> anyhow::Result<(Self, BackgroundQueueHandle)> {
        Self::assemble(config, directory, Arc::new(InMemorySessionBackend::new()))
    }

    /// Connect to Postgres and Redis; any connection failure aborts startup.
    pub async fn persistent(config: &AppConfig) -> anyhow::Result<(Self, BackgroundQueueHandle)> {
        let url = config
            .stores
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set for persistent stores")?;

        let pool = PgPoolOptions::new()
            .max_connections(config.stores.db_max_connections)
            .acquire_timeout(config.server.request_timeout)
            .connect(url)
            .await
            .context("failed to connect to Postgres")?;
        info!(max_connections = config.stores.db_max_connections, "connected to Postgres");

        let backend = RedisSessionBackend::connect(&config.stores.redis_url)
            .await
            .context("failed to connect to Redis")?;
        info!("connected to Redis");

        Self::assemble(config, Arc::new(PostgresUserDirectory::new(pool)), Arc::new(backend))
    }

    pub async fn from_config(config: &AppConfig) -> anyhow::Result<(Self, BackgroundQueueHandle)> {
        if config.stores.use_persistent_stores {
            Self::persistent(config).await
        } else {
            info!("using in-memory directory and session store");
            Self::in_memory(config, Arc::new(InMemoryUserDirectory::new()))
        }
    }

    fn assemble(
        config: &AppConfig,
        directory: Arc<dyn UserDirectory>,
        backend: Arc<dyn SessionBackend>,
    ) -> anyhow::Result<(Self, BackgroundQueueHandle)> {
        let token_ttl = chrono::Duration::from_std(config.auth.token_ttl).context("TOKEN_TTL_SECS out of range")?;
        let (background, handle) = BackgroundQueue::start(config.background.clone());
        let sessions = SessionCache::new(backend, config.session.clone(), background.clone());

        let services = Self {
            tokens: Arc::new(TokenService::new(&config.auth.jwt_secret)),
            sessions,
            directory,
            background,
            token_ttl,
            request_timeout: config.server.request_timeout,
            login_limiter: RateLimiter::new(config.login_rate_limit),
            login_metrics: Arc::new(LoginMetrics::default()),
        };
        Ok((services, handle))
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            tokens: self.tokens.clone(),
            sessions: self.sessions.clone(),
            directory: self.directory.clone(),
            request_timeout: self.request_timeout,
        }
    }
}
