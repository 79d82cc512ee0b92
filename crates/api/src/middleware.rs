use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};

use careerlink_auth::{Identity, PrincipalId, TokenService};
use careerlink_infra::{DirectoryError, SessionCache, UserDirectory};

use crate::app::errors::AuthError;
use crate::context::{AuthContext, RequestDeadline};

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
    pub sessions: SessionCache,
    pub directory: Arc<dyn UserDirectory>,
    /// Used when no deadline was stamped by [`deadline_middleware`].
    pub request_timeout: Duration,
}

/// Stamp every request with its deadline.
pub async fn deadline_middleware(
    State(timeout): State<Duration>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    req.extensions_mut().insert(RequestDeadline::after(timeout));
    next.run(req).await
}

/// Resolve the bearer token to an identity and attach it as [`AuthContext`].
///
/// Any failure short-circuits with a 401 and the handler never runs.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let deadline = req
        .extensions()
        .get::<RequestDeadline>()
        .copied()
        .unwrap_or_else(|| RequestDeadline::after(state.request_timeout));

    let identity = match authenticate(&state, req.headers(), deadline).await {
        Ok(identity) => identity,
        Err(e) => {
            debug!(path = %req.uri().path(), reason = %e, "request not authenticated");
            return Err(e);
        }
    };

    req.extensions_mut().insert(AuthContext::new(identity));
    Ok(next.run(req).await)
}

/// Credential -> token -> cache -> directory.
///
/// A cache miss falls through to the directory under the request deadline;
/// the resolved identity is written back to the cache off the request path.
pub async fn authenticate(
    state: &AuthState,
    headers: &HeaderMap,
    deadline: RequestDeadline,
) -> Result<Identity, AuthError> {
    let token = extract_bearer(headers)?;
    let payload = state.tokens.verify_token(token)?;

    // Cache keys are built from parsed ids, so an unparseable subject can
    // never be a hit.
    let id: PrincipalId = payload
        .subject_id
        .parse()
        .map_err(|_| AuthError::InvalidSubject)?;

    if let Some(identity) = state.sessions.lookup(id).await {
        return Ok(identity);
    }

    let resolved = tokio::time::timeout_at(deadline.instant(), state.directory.resolve_identity(id)).await;
    let identity = match resolved {
        Ok(Ok(identity)) => identity,
        Ok(Err(DirectoryError::NotFound)) => return Err(AuthError::PrincipalNotFound),
        Ok(Err(DirectoryError::InvalidRecord(reason))) => {
            error!(principal_id = %id, %reason, "directory returned an inconsistent principal");
            return Err(AuthError::PrincipalNotFound);
        }
        Ok(Err(e)) => {
            warn!(principal_id = %id, error = %e, "directory lookup failed");
            return Err(AuthError::DirectoryUnavailable(e));
        }
        Err(_) => {
            warn!(principal_id = %id, "directory lookup exceeded request deadline");
            return Err(AuthError::DirectoryUnavailable(DirectoryError::Timeout));
        }
    };

    state.sessions.populate_in_background(identity.clone());
    Ok(identity)
}

/// `Authorization: Bearer <token>`; exactly two whitespace-separated parts,
/// scheme compared case-insensitively.
fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;

    let header = header.to_str().map_err(|_| AuthError::MalformedCredential)?;
    if header.trim().is_empty() {
        return Err(AuthError::MissingCredential);
    }

    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MalformedCredential),
    }
}
