//! Authoritative principal lookup.
//!
//! The auth pipeline only reads from the directory; registration, profile
//! and role changes happen elsewhere and show up in the session cache once
//! the cached snapshot expires or is invalidated.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use careerlink_auth::{AdminProfile, Identity, IdentityError, Principal, PrincipalId, Role};

pub use in_memory::InMemoryUserDirectory;
pub use postgres::PostgresUserDirectory;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("principal not found")]
    NotFound,

    #[error("directory unavailable: {0}")]
    Unavailable(String),

    #[error("directory lookup timed out")]
    Timeout,

    #[error("invalid directory record: {0}")]
    InvalidRecord(String),
}

/// How a login request names its account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Email(String),
    Username(String),
}

/// Principal plus stored password hash; only ever used by login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub principal: Principal,
    pub password_hash: String,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn fetch_by_id(&self, id: PrincipalId) -> Result<Principal, DirectoryError>;

    async fn fetch_admin_profile(&self, id: PrincipalId) -> Result<AdminProfile, DirectoryError>;

    async fn fetch_by_email(&self, email: &str) -> Result<Principal, DirectoryError>;

    async fn fetch_by_username(&self, username: &str) -> Result<Principal, DirectoryError>;

    async fn fetch_credentials(&self, identifier: &LoginIdentifier) -> Result<Credentials, DirectoryError>;

    async fn ping(&self) -> Result<(), DirectoryError>;

    /// Principal plus, for admins, the admin profile.
    ///
    /// An admin without a profile row is reported as `InvalidRecord` so the
    /// caller never sees an identity that breaks the admin-profile invariant.
    async fn resolve_identity(&self, id: PrincipalId) -> Result<Identity, DirectoryError> {
        let principal = self.fetch_by_id(id).await?;

        let admin = if principal.role == Role::Admin {
            match self.fetch_admin_profile(id).await {
                Ok(admin) => Some(admin),
                Err(DirectoryError::NotFound) => None,
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        Identity::new(principal, admin).map_err(|e: IdentityError| DirectoryError::InvalidRecord(e.to_string()))
    }
}

pub(crate) fn parse_role(raw: &str) -> Result<Role, DirectoryError> {
    Role::parse(raw).ok_or_else(|| DirectoryError::InvalidRecord(format!("unknown role '{raw}'")))
}
