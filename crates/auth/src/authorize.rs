use serde::Serialize;
use thiserror::Error;

use crate::{AdminRole, Identity, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("{0} required")]
    Forbidden(&'static str),
}

/// Predicate a resolved identity must satisfy to pass a guard.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum RoleRequirement {
    /// The principal's account role.
    Role(Role),
    /// The admin profile's sub-role; implies `Role::Admin`.
    AdminSubRole(AdminRole),
}

impl RoleRequirement {
    pub const ADMIN: Self = Self::Role(Role::Admin);
    pub const COMPANY: Self = Self::Role(Role::Company);
    pub const JOB_SEEKER: Self = Self::Role(Role::JobSeeker);
    pub const SUPER_ADMIN: Self = Self::AdminSubRole(AdminRole::Super);

    /// Client-facing name of the role class this requirement asks for.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Role(Role::Admin) => "admin role",
            Self::Role(Role::Company) => "company role",
            Self::Role(Role::JobSeeker) => "job seeker role",
            Self::AdminSubRole(AdminRole::Super) => "super admin role",
            Self::AdminSubRole(AdminRole::Admin) => "admin role",
            Self::AdminSubRole(AdminRole::Viewer) => "viewer admin role",
        }
    }

    pub fn is_satisfied_by(&self, identity: &Identity) -> bool {
        match self {
            Self::Role(role) => identity.role() == *role,
            Self::AdminSubRole(sub_role) => identity
                .admin()
                .is_some_and(|admin| admin.sub_role == *sub_role),
        }
    }
}

/// Check an already-resolved identity against a requirement.
///
/// - No IO
/// - Fails closed: a missing identity is forbidden, never an error to bubble.
pub fn authorize(identity: Option<&Identity>, requirement: RoleRequirement) -> Result<(), AuthzError> {
    match identity {
        Some(identity) if requirement.is_satisfied_by(identity) => Ok(()),
        _ => Err(AuthzError::Forbidden(requirement.label())),
    }
}
