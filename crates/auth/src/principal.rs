use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AdminRole, Role};

/// Identity of a principal in the user directory.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<PrincipalId> for Uuid {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A user account as held by the authoritative store.
///
/// Never carries credentials; password hashes travel separately so a
/// `Principal` can be cached and returned to clients as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub avatar: Option<String>,
}

/// Administrative sub-role record, present only for `Role::Admin` principals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub admin_id: Uuid,
    pub sub_role: AdminRole,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("admin principal {0} has no admin profile")]
    MissingAdminProfile(PrincipalId),
}

/// A resolved principal together with its admin profile.
///
/// # Invariants
/// - `admin` is `Some` if and only if `principal.role == Role::Admin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    principal: Principal,
    admin: Option<AdminProfile>,
}

impl Identity {
    /// Pair a principal with its admin profile.
    ///
    /// A profile supplied for a non-admin principal is discarded; an admin
    /// principal without a profile is rejected.
    pub fn new(principal: Principal, admin: Option<AdminProfile>) -> Result<Self, IdentityError> {
        match (principal.role, admin) {
            (Role::Admin, Some(admin)) => Ok(Self {
                principal,
                admin: Some(admin),
            }),
            (Role::Admin, None) => Err(IdentityError::MissingAdminProfile(principal.id)),
            (_, _) => Ok(Self {
                principal,
                admin: None,
            }),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn admin(&self) -> Option<&AdminProfile> {
        self.admin.as_ref()
    }

    pub fn id(&self) -> PrincipalId {
        self.principal.id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn into_parts(self) -> (Principal, Option<AdminProfile>) {
        (self.principal, self.admin)
    }
}
