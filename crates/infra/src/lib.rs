//! Infrastructure layer: session cache, user directory, background work, config.

pub mod config;
pub mod directory;
pub mod jobs;
pub mod session;

pub use config::{AppConfig, ConfigError, LoginRateLimit};
pub use directory::{Credentials, DirectoryError, LoginIdentifier, UserDirectory};
pub use jobs::{BackgroundQueue, BackgroundQueueConfig, BackgroundQueueHandle, QueueStats};
pub use session::{SessionCache, SessionCacheConfig, SessionCacheError, SessionKey};
