use std::sync::{PoisonError, RwLock};

use chrono::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::session::{Session, DEFAULT_MAX_AGE_HOURS};
use super::storage::{SessionStorage, StorageError};

/// Durable write or removal of the session record failed.
///
/// Reported to the caller; the in-memory state has already changed.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

/// Single process-wide slot for the current session.
///
/// This is the only writer of session state. Every change is mirrored to
/// the durable backend so a restart finds the same session.
pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Open the store, rehydrating a persisted session if one is usable.
    ///
    /// Unreadable, malformed, or expired records leave the store logged out.
    pub fn open(storage: impl SessionStorage + 'static, max_age: Duration) -> Self {
        let current = Self::rehydrate(&storage, max_age);
        Self {
            storage: Box::new(storage),
            current: RwLock::new(current),
        }
    }

    /// Open with the default token lifetime
    pub fn open_default(storage: impl SessionStorage + 'static) -> Self {
        Self::open(storage, Duration::hours(DEFAULT_MAX_AGE_HOURS))
    }

    fn rehydrate(storage: &dyn SessionStorage, max_age: Duration) -> Option<Session> {
        let record = match storage.read() {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No persisted session found");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session, starting logged out");
                return None;
            }
        };

        let session: Session = match serde_json::from_str(&record) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Persisted session is malformed, starting logged out");
                return None;
            }
        };

        if session.is_expired(max_age) {
            debug!(username = %session.username, "Persisted session expired");
            return None;
        }

        debug!(username = %session.username, "Session rehydrated");
        Some(session)
    }

    pub fn get(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get the bearer token if a session is present
    pub fn token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.token.clone())
    }

    pub fn is_present(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Replace the current session and persist it.
    pub fn set(&self, session: Session) -> Result<(), PersistenceError> {
        let record = serde_json::to_string_pretty(&session);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        self.storage.write(&record?)?;
        Ok(())
    }

    /// Remove the current session and its durable copy. Idempotent.
    pub fn clear(&self) -> Result<(), PersistenceError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.storage.remove()?;
        Ok(())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("has_session", &self.is_present())
            .finish()
    }
}
