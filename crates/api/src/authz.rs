//! Role guards for route groups.
//!
//! A guard runs after the auth middleware and only reads the attached
//! [`AuthContext`]. Mount it with `route_layer` so unmatched paths still 404.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{from_fn_with_state, Next},
    response::Response,
};
use tracing::{debug, error};

use careerlink_auth::{authorize, RoleRequirement};

use crate::app::errors::AuthError;
use crate::context::AuthContext;

/// Reject the request with 403 unless the identity satisfies `requirement`.
pub async fn require_role(
    State(requirement): State<RoleRequirement>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let ctx = req.extensions().get::<AuthContext>();
    if ctx.is_none() {
        error!(path = %req.uri().path(), "role guard reached without an authenticated identity");
    }

    if let Err(e) = authorize(ctx.map(AuthContext::identity), requirement) {
        debug!(
            path = %req.uri().path(),
            principal_id = ?ctx.map(AuthContext::principal_id),
            requirement = requirement.label(),
            "role guard rejected request"
        );
        return Err(e.into());
    }

    Ok(next.run(req).await)
}

/// Apply guards to a router; the first requirement is checked first.
pub fn guarded<S>(router: axum::Router<S>, requirements: &[RoleRequirement]) -> axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // Later layers wrap earlier ones, so add in reverse.
    requirements.iter().rev().fold(router, |router, requirement| {
        router.route_layer(from_fn_with_state(*requirement, require_role))
    })
}
