use axum::{extract::Extension, routing::get, Json, Router};

use crate::app::dto::IdentityResponse;
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new().route("/company", get(company))
}

pub async fn company(Extension(ctx): Extension<AuthContext>) -> Json<IdentityResponse> {
    Json(IdentityResponse {
        user: ctx.principal().clone(),
        admin: None,
    })
}
