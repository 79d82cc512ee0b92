//! `careerlink-auth`: tokens, identities and role checks.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod principal;
pub mod roles;
pub mod token;

pub use authorize::{authorize, AuthzError, RoleRequirement};
pub use claims::{validate_claims, TokenError, TokenPayload};
pub use password::{hash_password, verify_password, verify_unknown_account, PasswordError};
pub use principal::{AdminProfile, Identity, IdentityError, Principal, PrincipalId};
pub use roles::{AdminRole, Role};
pub use token::{IssuedToken, TokenService};
