//! Bearer token store with a read-through memory cache.
//!
//! # Design
//! The durable store is the source of truth across restarts; the memory
//! cache only saves storage reads. `get_token` fills the cache lazily, so a
//! freshly constructed store recovers a persisted token without an explicit
//! init step. Storage failures are logged and never fail the caller: the
//! in-memory value stays authoritative for the current process.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::storage::Storage;

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const USERNAME_KEY: &str = "username";

/// Username that unlocks admin-only features.
pub const ADMIN_USERNAME: &str = "admin";

pub struct TokenStore {
    durable: Arc<dyn Storage>,
    session: Arc<dyn Storage>,
    cached: Mutex<Option<String>>,
}

impl TokenStore {
    pub fn new(durable: Arc<dyn Storage>, session: Arc<dyn Storage>) -> Self {
        Self {
            durable,
            session,
            cached: Mutex::new(None),
        }
    }

    fn cache(&self) -> MutexGuard<'_, Option<String>> {
        self.cached.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `token`, or forget it when `None`.
    pub fn set_token(&self, token: Option<&str>) {
        let mut cached = self.cache();
        match token {
            Some(token) => {
                *cached = Some(token.to_string());
                if let Err(e) = self.durable.set(AUTH_TOKEN_KEY, token) {
                    warn!(error = %e, "failed to persist auth token");
                }
            }
            None => {
                *cached = None;
                if let Err(e) = self.durable.remove(AUTH_TOKEN_KEY) {
                    warn!(error = %e, "failed to remove persisted auth token");
                }
            }
        }
    }

    pub fn get_token(&self) -> Option<String> {
        let mut cached = self.cache();
        if cached.is_none() {
            *cached = match self.durable.get(AUTH_TOKEN_KEY) {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "failed to read persisted auth token");
                    None
                }
            };
        }
        cached.clone()
    }

    pub fn has_token(&self) -> bool {
        self.get_token().is_some()
    }

    /// Wipe the durable and session stores entirely, not just the token.
    pub fn clear_all(&self) {
        let mut cached = self.cache();
        *cached = None;
        if let Err(e) = self.durable.clear() {
            warn!(error = %e, "failed to clear durable storage");
        }
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "failed to clear session storage");
        }
    }

    pub fn set_username(&self, username: Option<&str>) {
        let result = match username {
            Some(name) => self.durable.set(USERNAME_KEY, name),
            None => self.durable.remove(USERNAME_KEY),
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to update username marker");
        }
    }

    pub fn username(&self) -> Option<String> {
        self.durable.get(USERNAME_KEY).unwrap_or_else(|e| {
            warn!(error = %e, "failed to read username marker");
            None
        })
    }

    pub fn is_admin(&self) -> bool {
        self.username().as_deref() == Some(ADMIN_USERNAME)
    }
}
