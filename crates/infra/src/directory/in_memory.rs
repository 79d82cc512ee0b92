use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use careerlink_auth::{AdminProfile, Principal, PrincipalId};

use super::{Credentials, DirectoryError, LoginIdentifier, UserDirectory};

#[derive(Debug, Clone)]
struct Record {
    principal: Principal,
    admin: Option<AdminProfile>,
    password_hash: String,
}

/// Seedable in-memory directory.
///
/// Intended for tests/dev. Counts id lookups so callers can observe whether
/// a request reached the directory at all.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    records: RwLock<HashMap<PrincipalId, Record>>,
    id_lookups: AtomicUsize,
    offline: AtomicBool,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a principal.
    pub fn insert(
        &self,
        principal: Principal,
        admin: Option<AdminProfile>,
        password_hash: impl Into<String>,
    ) -> Result<(), DirectoryError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        records.insert(
            principal.id,
            Record {
                principal,
                admin,
                password_hash: password_hash.into(),
            },
        );
        Ok(())
    }

    /// Number of `fetch_by_id` calls served so far.
    pub fn id_lookups(&self) -> usize {
        self.id_lookups.load(Ordering::SeqCst)
    }

    /// Simulate a connectivity failure on every call.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), DirectoryError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("directory offline".to_string()));
        }
        Ok(())
    }

    fn find<F>(&self, pred: F) -> Result<Record, DirectoryError>
    where
        F: Fn(&Record) -> bool,
    {
        self.check_online()?;
        let records = self.records.read().map_err(|_| poisoned())?;
        records
            .values()
            .find(|r| pred(*r))
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }
}

fn poisoned() -> DirectoryError {
    DirectoryError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn fetch_by_id(&self, id: PrincipalId) -> Result<Principal, DirectoryError> {
        self.id_lookups.fetch_add(1, Ordering::SeqCst);
        self.find(|r| r.principal.id == id).map(|r| r.principal)
    }

    async fn fetch_admin_profile(&self, id: PrincipalId) -> Result<AdminProfile, DirectoryError> {
        self.find(|r| r.principal.id == id)?
            .admin
            .ok_or(DirectoryError::NotFound)
    }

    async fn fetch_by_email(&self, email: &str) -> Result<Principal, DirectoryError> {
        self.find(|r| r.principal.email == email).map(|r| r.principal)
    }

    async fn fetch_by_username(&self, username: &str) -> Result<Principal, DirectoryError> {
        self.find(|r| r.principal.username == username).map(|r| r.principal)
    }

    async fn fetch_credentials(&self, identifier: &LoginIdentifier) -> Result<Credentials, DirectoryError> {
        let record = match identifier {
            LoginIdentifier::Email(email) => self.find(|r| &r.principal.email == email)?,
            LoginIdentifier::Username(username) => self.find(|r| &r.principal.username == username)?,
        };
        Ok(Credentials {
            principal: record.principal,
            password_hash: record.password_hash,
        })
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        self.check_online()
    }
}
