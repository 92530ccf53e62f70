//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `Session`: the token and identity of the current login
//! - `SessionStore`: the single slot holding it, mirrored to durable storage
//! - `SessionStorage`: file, OS keychain, and in-memory backends
//! - `CredentialSubmission`: username and password for one attempt
//!
//! Persisted sessions older than the token lifetime are discarded on load.

pub mod credentials;
pub mod session;
pub mod storage;
pub mod store;

pub use credentials::CredentialSubmission;
pub use session::{AuthState, Session, DEFAULT_MAX_AGE_HOURS};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, StorageError};
pub use store::{PersistenceError, SessionStore};
