//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: directory, session cache and background queue wiring
//! - `routes/`: HTTP routes + handlers (one file per route group)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: error responses (`{"error": "..."}`)
//! - `metrics.rs`: login outcome counters

use std::sync::Arc;

use axum::{
    middleware::{from_fn_with_state, map_response},
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod metrics;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices) -> Router {
    let auth_state = services.auth_state();
    let request_timeout = services.request_timeout;
    let login_limiter = services.login_limiter.clone();
    let services = Arc::new(services);

    // Protected routes: deadline -> auth pipeline -> role guards -> handler.
    let protected = routes::protected_router()
        .route_layer(from_fn_with_state(auth_state, middleware::auth_middleware));

    Router::new()
        .merge(routes::public_router(login_limiter))
        .merge(protected)
        .fallback(errors::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(errors::panic_response))
                .layer(map_response(errors::json_method_not_allowed))
                .layer(from_fn_with_state(request_timeout, middleware::deadline_middleware))
                .layer(Extension(services)),
        )
}
