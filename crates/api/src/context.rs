use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use careerlink_auth::{AdminProfile, Identity, Principal, PrincipalId};

/// Authenticated identity for a request.
///
/// Only the auth middleware constructs one; handlers and guards read it.
#[derive(Debug, Clone)]
pub struct AuthContext {
    identity: Arc<Identity>,
}

impl AuthContext {
    pub(crate) fn new(identity: Identity) -> Self {
        Self {
            identity: Arc::new(identity),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn principal(&self) -> &Principal {
        self.identity.principal()
    }

    pub fn admin(&self) -> Option<&AdminProfile> {
        self.identity.admin()
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.identity.id()
    }
}

/// Point in time by which the request's directory work must finish.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestDeadline(Instant);

impl RequestDeadline {
    /// Timeouts too large for the clock are clamped to roughly thirty years.
    pub fn after(timeout: Duration) -> Self {
        const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);
        let now = Instant::now();
        Self(
            now.checked_add(timeout)
                .or_else(|| now.checked_add(FAR_FUTURE))
                .unwrap_or(now),
        )
    }

    pub fn instant(&self) -> Instant {
        self.0
    }
}
