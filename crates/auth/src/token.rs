//! HS256 token issuance and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::{validate_claims, TokenError, TokenPayload};

/// A freshly signed token and the claims it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub payload: TokenPayload,
}

/// Issues and verifies signed, time-bounded identity tokens under a single
/// symmetric secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();

        // Timestamps are checked by `validate_claims`; the library only
        // verifies algorithm and signature.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign a token for `subject_id` valid for `duration` from now.
    pub fn create_token(
        &self,
        subject_id: &str,
        email: &str,
        duration: Duration,
    ) -> Result<IssuedToken, TokenError> {
        self.create_token_at(subject_id, email, duration, Utc::now())
    }

    /// Same as [`TokenService::create_token`] with an explicit clock.
    ///
    /// `issued_at` is truncated to whole seconds so the payload survives the
    /// wire encoding unchanged.
    pub fn create_token_at(
        &self,
        subject_id: &str,
        email: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        if duration <= Duration::zero() {
            return Err(TokenError::InvalidDuration);
        }

        let issued_at =
            DateTime::<Utc>::from_timestamp(now.timestamp(), 0).ok_or(TokenError::InvalidDuration)?;
        let expires_at = issued_at
            .checked_add_signed(duration)
            .ok_or(TokenError::InvalidDuration)?;

        let payload = TokenPayload {
            subject_id: subject_id.to_string(),
            email: email.to_string(),
            issued_at,
            expires_at,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, payload })
    }

    /// Verify signature and expiry, returning the embedded payload.
    pub fn verify_token(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_token_at(token, Utc::now())
    }

    pub fn verify_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenPayload, TokenError> {
        let data = jsonwebtoken::decode::<TokenPayload>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
