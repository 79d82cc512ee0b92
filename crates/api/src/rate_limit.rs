//! Fixed-window rate limiting for credential endpoints, keyed by client
//! address.
//!
//! State is per process; a multi-instance deployment limits per instance.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;
use tracing::warn;

use careerlink_infra::LoginRateLimit;

use crate::app::errors::json_error;

/// Expired windows are swept once the table grows past this size.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: LoginRateLimit,
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
}

impl RateLimiter {
    pub fn new(config: LoginRateLimit) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one attempt from `client`; `false` once its window is spent.
    pub fn check(&self, client: IpAddr) -> bool {
        let now = Instant::now();
        let period = self.config.window;
        // The map is always left consistent, so a poisoned lock is still usable.
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() >= SWEEP_THRESHOLD {
            windows.retain(|_, w| now.duration_since(w.started) < period);
        }

        let window = windows.entry(client).or_insert(Window { count: 0, started: now });
        if now.duration_since(window.started) >= period {
            *window = Window { count: 0, started: now };
        }

        if window.count >= self.config.max_attempts {
            false
        } else {
            window.count += 1;
            true
        }
    }
}

/// Reject with 429 once the caller's address exceeds the login budget.
pub async fn login_rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = client_ip(&req);
    if !limiter.check(client) {
        warn!(client = %client, path = %req.uri().path(), "login rate limit exceeded");
        return json_error(
            StatusCode::TOO_MANY_REQUESTS,
            "too many authentication attempts, please try again later",
        );
    }
    next.run(req).await
}

/// Peer address from the connection; requests without one share a bucket.
fn client_ip(req: &Request<Body>) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
