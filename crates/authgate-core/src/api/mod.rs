//! HTTP side of the session lifecycle.
//!
//! This module provides:
//! - `ApiClient`: the register/login submission flow and token revocation
//! - `AuthenticatedFetch`: the chokepoint that attaches the session token
//!   to protected requests and ends the session on `401`
//!
//! The API uses JWT bearer token authentication obtained from the
//! `/api/register` and `/api/login` endpoints.

pub mod client;
pub mod error;
pub mod fetch;

pub use client::{ApiClient, AuthEndpoint, AuthResult};
pub use error::{AuthFailure, AuthFailureKind, FetchError};
pub use fetch::{AuthenticatedFetch, RequestOptions};
