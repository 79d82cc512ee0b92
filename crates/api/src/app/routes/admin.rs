//! Admin-only endpoints. Every route here requires the admin role; the
//! system views (background queue, login outcomes) additionally require the
//! super admin sub-role.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};
use tracing::error;

use careerlink_auth::{PrincipalId, RoleRequirement};
use careerlink_infra::{DirectoryError, QueueStats};

use crate::app::dto::IdentityResponse;
use crate::app::errors::ApiError;
use crate::app::metrics::LoginStats;
use crate::app::services::AppServices;
use crate::authz::guarded;

pub fn router() -> Router {
    let users = Router::new().route("/admin/users/:id", get(get_user));
    let system = guarded(
        Router::new()
            .route("/admin/system/background", get(background_stats))
            .route("/admin/system/logins", get(login_stats)),
        &[RoleRequirement::SUPER_ADMIN],
    );

    guarded(users.merge(system), &[RoleRequirement::ADMIN])
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let id: PrincipalId = id.parse().map_err(|_| ApiError::BadRequest("invalid user id"))?;

    let identity = services.directory.resolve_identity(id).await.map_err(|e| match e {
        DirectoryError::NotFound => ApiError::NotFound("user not found"),
        other => {
            error!(principal_id = %id, error = %other, "admin user lookup failed");
            ApiError::Internal
        }
    })?;

    let (user, admin) = identity.into_parts();
    Ok(Json(IdentityResponse { user, admin }))
}

pub async fn background_stats(Extension(services): Extension<Arc<AppServices>>) -> Json<QueueStats> {
    Json(services.background.stats())
}

pub async fn login_stats(Extension(services): Extension<Arc<AppServices>>) -> Json<LoginStats> {
    Json(services.login_metrics.snapshot())
}
