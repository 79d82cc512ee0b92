use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use tracing::{debug, error, info, warn};

use careerlink_auth::{verify_password, verify_unknown_account, Identity, Role};
use careerlink_infra::{DirectoryError, LoginIdentifier};

use crate::app::dto::{IdentityResponse, LoginRequest, LoginResponse, MessageResponse};
use crate::app::errors::ApiError;
use crate::app::metrics::LoginOutcome;
use crate::app::services::AppServices;
use crate::context::AuthContext;

const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Why a well-formed login was refused. Kept apart from `ApiError` so each
/// refusal maps to exactly one metrics outcome.
#[derive(Debug)]
enum LoginFailure {
    InvalidCredentials,
    Inactive,
    Internal,
}

impl LoginFailure {
    fn outcome(&self) -> LoginOutcome {
        match self {
            LoginFailure::InvalidCredentials => LoginOutcome::InvalidCredentials,
            LoginFailure::Inactive => LoginOutcome::Inactive,
            LoginFailure::Internal => LoginOutcome::ServerError,
        }
    }
}

impl From<LoginFailure> for ApiError {
    fn from(failure: LoginFailure) -> Self {
        match failure {
            LoginFailure::InvalidCredentials => ApiError::Unauthorized(INVALID_CREDENTIALS),
            LoginFailure::Inactive => ApiError::Unauthorized("user is not active"),
            LoginFailure::Internal => ApiError::Internal,
        }
    }
}

/// Exchange email/username and password for a bearer token.
///
/// Any previous session snapshot is replaced; cache failures do not fail
/// the login since the pipeline falls back to the directory.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::BadRequest("invalid request payload"))?;
    let identifier = req
        .identifier()
        .ok_or(ApiError::BadRequest("email or username is required"))?;

    let result = attempt_login(&services, &identifier, req.password).await;
    let outcome = match &result {
        Ok(_) => LoginOutcome::Success,
        Err(failure) => failure.outcome(),
    };
    services.login_metrics.record(outcome);
    debug!(outcome = outcome.as_str(), "login attempt recorded");

    Ok(Json(result?))
}

async fn attempt_login(
    services: &AppServices,
    identifier: &LoginIdentifier,
    password: String,
) -> Result<LoginResponse, LoginFailure> {
    let credentials = match services.directory.fetch_credentials(identifier).await {
        Ok(credentials) => credentials,
        Err(DirectoryError::NotFound) => {
            // Same Argon2 cost as a wrong password for a known account.
            run_blocking(move || verify_unknown_account(&password)).await?;
            return Err(LoginFailure::InvalidCredentials);
        }
        Err(e) => {
            error!(error = %e, "credential lookup failed");
            return Err(LoginFailure::Internal);
        }
    };

    let hash = credentials.password_hash;
    if !run_blocking(move || verify_password(&hash, &password)).await? {
        return Err(LoginFailure::InvalidCredentials);
    }

    let principal = credentials.principal;
    if !principal.is_active {
        return Err(LoginFailure::Inactive);
    }

    let id = principal.id;
    let admin = if principal.role == Role::Admin {
        match services.directory.fetch_admin_profile(id).await {
            Ok(admin) => Some(admin),
            Err(DirectoryError::NotFound) => None,
            Err(e) => {
                error!(principal_id = %id, error = %e, "admin profile lookup failed");
                return Err(LoginFailure::Internal);
            }
        }
    } else {
        None
    };
    let identity = Identity::new(principal, admin).map_err(|e| {
        error!(principal_id = %id, error = %e, "cannot sign in inconsistent principal");
        LoginFailure::Internal
    })?;

    let issued = services
        .tokens
        .create_token(&id.to_string(), &identity.principal().email, services.token_ttl)
        .map_err(|e| {
            error!(principal_id = %id, error = %e, "token signing failed");
            LoginFailure::Internal
        })?;

    if let Err(e) = services.sessions.invalidate(id).await {
        warn!(principal_id = %id, error = %e, "could not clear previous session");
    }
    if let Err(e) = services.sessions.store(&identity, services.sessions.ttl()).await {
        warn!(principal_id = %id, error = %e, "could not store session");
    }

    info!(principal_id = %id, role = %identity.role(), "login succeeded");
    let (user, _) = identity.into_parts();
    Ok(LoginResponse {
        token: issued.token,
        expires_at: issued.payload.expires_at,
        user,
    })
}

/// Argon2 verification is CPU-bound.
async fn run_blocking<F>(verify: F) -> Result<bool, LoginFailure>
where
    F: FnOnce() -> bool + Send + 'static,
{
    tokio::task::spawn_blocking(verify).await.map_err(|e| {
        error!(error = %e, "password verification task failed");
        LoginFailure::Internal
    })
}

/// Drop the session snapshot. The token itself stays valid until expiry.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<AuthContext>,
) -> Json<MessageResponse> {
    let id = ctx.principal_id();
    if let Err(e) = services.sessions.invalidate(id).await {
        warn!(principal_id = %id, error = %e, "session invalidation failed on logout");
    }
    info!(principal_id = %id, "logged out");
    Json(MessageResponse { message: "logged out" })
}

pub async fn current_user(Extension(ctx): Extension<AuthContext>) -> Json<IdentityResponse> {
    Json(IdentityResponse {
        user: ctx.principal().clone(),
        admin: ctx.admin().cloned(),
    })
}
