use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::app::services::AppServices;

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Ping the directory and the session store concurrently.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> (StatusCode, Json<Value>) {
    let directory = tokio::time::timeout(HEALTH_PROBE_TIMEOUT, services.directory.ping());
    let sessions = tokio::time::timeout(HEALTH_PROBE_TIMEOUT, services.sessions.ping());
    let (directory, sessions) = tokio::join!(directory, sessions);

    let mut healthy = true;
    match directory {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(error = %e, "health: directory ping failed");
            healthy = false;
        }
        Err(_) => {
            warn!("health: directory ping timed out");
            healthy = false;
        }
    }
    match sessions {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(error = %e, "health: session store ping failed");
            healthy = false;
        }
        Err(_) => {
            warn!("health: session store ping timed out");
            healthy = false;
        }
    }

    if healthy {
        (StatusCode::OK, Json(json!({ "status": "healthy" })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "unhealthy" })))
    }
}
