use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use careerlink_auth::RoleRequirement;

use crate::authz::guarded;
use crate::rate_limit::{login_rate_limit, RateLimiter};

pub mod admin;
pub mod auth;
pub mod company;
pub mod job_seeker;
pub mod system;

/// Endpoints reachable without a credential. Login is rate limited per
/// client address.
pub fn public_router(login_limiter: RateLimiter) -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route(
            "/login",
            post(auth::login).layer(from_fn_with_state(login_limiter, login_rate_limit)),
        )
}

/// Endpoints behind the auth pipeline; each group adds its role guards.
pub fn protected_router() -> Router {
    Router::new()
        .route("/user", get(auth::current_user))
        .route("/logout", post(auth::logout))
        .merge(guarded(job_seeker::router(), &[RoleRequirement::JOB_SEEKER]))
        .merge(guarded(company::router(), &[RoleRequirement::COMPANY]))
        .merge(admin::router())
}
