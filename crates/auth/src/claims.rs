use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims embedded in a signed identity token.
///
/// Tokens are stateless: nothing is recorded server-side at issuance, so
/// validity depends only on the signature and these timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Subject identifier, kept as the raw string carried on the wire.
    #[serde(rename = "user_id")]
    pub subject_id: String,

    pub email: String,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "expired_at", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not verify")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token lifetime must be positive")]
    InvalidDuration,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Deterministically validate token claims against `now`.
///
/// Signature verification happens before this in `TokenService`.
pub fn validate_claims(claims: &TokenPayload, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenError::Malformed);
    }
    if now > claims.expires_at {
        return Err(TokenError::Expired);
    }
    Ok(())
}
