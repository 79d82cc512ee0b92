use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// How a login attempt ended. Malformed payloads are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    InvalidCredentials,
    Inactive,
    ServerError,
}

impl LoginOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginOutcome::Success => "success",
            LoginOutcome::InvalidCredentials => "invalid_credentials",
            LoginOutcome::Inactive => "inactive",
            LoginOutcome::ServerError => "server_error",
        }
    }
}

/// Process-wide login outcome counters.
#[derive(Debug, Default)]
pub struct LoginMetrics {
    success: AtomicU64,
    invalid_credentials: AtomicU64,
    inactive: AtomicU64,
    server_error: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoginStats {
    pub success: u64,
    pub invalid_credentials: u64,
    pub inactive: u64,
    pub server_error: u64,
}

impl LoginMetrics {
    pub fn record(&self, outcome: LoginOutcome) {
        let counter = match outcome {
            LoginOutcome::Success => &self.success,
            LoginOutcome::InvalidCredentials => &self.invalid_credentials,
            LoginOutcome::Inactive => &self.inactive,
            LoginOutcome::ServerError => &self.server_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LoginStats {
        LoginStats {
            success: self.success.load(Ordering::Relaxed),
            invalid_credentials: self.invalid_credentials.load(Ordering::Relaxed),
            inactive: self.inactive.load(Ordering::Relaxed),
            server_error: self.server_error.load(Ordering::Relaxed),
        }
    }
}
