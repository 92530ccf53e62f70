//! Client-side authentication session manager.
//!
//! A host application builds one [`AuthContext`] at startup and hands
//! clones to its views. Views submit credentials through [`ApiClient`],
//! pass the resulting [`Session`] to [`AuthContext::login`], subscribe to
//! state changes, and make protected calls through [`AuthenticatedFetch`].

pub mod api;
pub mod auth;
pub mod config;
pub mod context;

pub use api::{ApiClient, AuthEndpoint, AuthFailure, AuthFailureKind, AuthResult, AuthenticatedFetch, FetchError, RequestOptions};
pub use auth::{AuthState, CredentialSubmission, PersistenceError, Session, SessionStore};
pub use config::{Config, StorageBackend};
pub use context::{AuthContext, Subscription};
