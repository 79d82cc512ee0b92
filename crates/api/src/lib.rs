//! HTTP API: authentication pipeline, role guards, routing.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
pub mod rate_limit;
