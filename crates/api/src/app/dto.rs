use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use careerlink_auth::{AdminProfile, Principal};
use careerlink_infra::LoginIdentifier;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

impl LoginRequest {
    /// Email wins when both are present; blank values count as absent.
    pub fn identifier(&self) -> Option<LoginIdentifier> {
        let present = |v: &Option<String>| v.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);

        present(&self.email)
            .map(LoginIdentifier::Email)
            .or_else(|| present(&self.username).map(LoginIdentifier::Username))
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Principal,
}

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub user: Principal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<AdminProfile>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
