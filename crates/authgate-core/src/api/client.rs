//! API client for the register, login and logout endpoints.
//!
//! This module provides the `ApiClient` struct, which runs the credential
//! submission flow and hands the shared connection pool to
//! [`AuthenticatedFetch`](super::AuthenticatedFetch).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::{CredentialSubmission, Session};

use super::{AuthFailure, FetchError};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const REGISTER_PATH: &str = "/api/register";
const LOGIN_PATH: &str = "/api/login";
const LOGOUT_PATH: &str = "/api/logout";

/// Outcome of a credential submission: a new session, or why there is none.
pub type AuthResult = std::result::Result<Session, AuthFailure>;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Which credential endpoint a submission targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEndpoint {
    Register,
    Login,
}

impl AuthEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            AuthEndpoint::Register => REGISTER_PATH,
            AuthEndpoint::Login => LOGIN_PATH,
        }
    }
}

/// API client for the auth server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client for `base_url` (e.g. `http://localhost:5000`)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "API client created");

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Build an absolute URL from an API path
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn register(&self, submission: &CredentialSubmission) -> AuthResult {
        self.submit(AuthEndpoint::Register, submission).await
    }

    pub async fn login(&self, submission: &CredentialSubmission) -> AuthResult {
        self.submit(AuthEndpoint::Login, submission).await
    }

    /// Send `submission` to `endpoint` once and interpret the response.
    ///
    /// Empty fields are rejected before any request is made. The returned
    /// session is not stored; pass it to `AuthContext::login`.
    pub async fn submit(&self, endpoint: AuthEndpoint, submission: &CredentialSubmission) -> AuthResult {
        if let Err(reason) = submission.validate() {
            debug!(reason, "Submission rejected locally");
            return Err(AuthFailure::Validation(reason));
        }

        let url = self.url(endpoint.path());
        debug!(url = %url, username = %submission.username, "Submitting credentials");

        let response = self.client.post(&url).json(submission).send().await?;
        let status = response.status();

        if status.is_server_error() {
            warn!(%status, "Auth server error");
            return Err(AuthFailure::ServerUnavailable(status));
        }

        let body = response.text().await?;
        let parsed: TokenResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                warn!(error = %e, "Failed to parse auth response");
                return Err(AuthFailure::MalformedResponse(e.to_string()));
            }
            Err(_) => {
                debug!(%status, "Credentials rejected with non-JSON body");
                return Err(AuthFailure::InvalidCredentials);
            }
        };

        // The server answers rejected credentials with an empty token
        match parsed.access_token.filter(|t| !t.is_empty()) {
            Some(token) if status.is_success() => {
                info!(username = %submission.username, "Credentials accepted");
                Ok(Session::new(token, submission.username.clone()))
            }
            _ => {
                debug!(%status, "Credentials rejected");
                Err(AuthFailure::InvalidCredentials)
            }
        }
    }

    /// Ask the server to blacklist `token`.
    ///
    /// Local logout does not depend on this succeeding.
    pub async fn revoke(&self, token: &str) -> std::result::Result<(), FetchError> {
        let url = self.url(LOGOUT_PATH);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("Token revoked");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::from_status(status, &body))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::AuthFailureKind;
    use crate::auth::{MemoryStorage, SessionStore};
    use crate::context::AuthContext;

    async fn mount_token(server: &MockServer, endpoint: &str, body: serde_json::Value, status: u16) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_url_joining() {
        let api = ApiClient::new("http://localhost:5000/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:5000");
        assert_eq!(api.url("/api/login"), "http://localhost:5000/api/login");
        assert_eq!(api.url("api/login"), "http://localhost:5000/api/login");
        assert_eq!(api.url("https://other/x"), "https://other/x");
    }

    #[tokio::test]
    async fn test_login_success_returns_session_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(body_json(serde_json::json!({"username": "alice", "password": "secret"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "tok123"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let session = api
            .login(&CredentialSubmission::new("alice", "secret"))
            .await
            .unwrap();

        assert_eq!(session.token, "tok123");
        assert_eq!(session.username, "alice");
    }

    #[tokio::test]
    async fn test_register_uses_register_endpoint() {
        let server = MockServer::start().await;
        mount_token(&server, REGISTER_PATH, serde_json::json!({"access_token": "fresh"}), 200).await;

        let api = ApiClient::new(server.uri()).unwrap();
        let session = api
            .register(&CredentialSubmission::new("bob", "pw"))
            .await
            .unwrap();

        assert_eq!(session.token, "fresh");
    }

    #[tokio::test]
    async fn test_empty_fields_never_reach_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        for (username, password) in [("", "secret"), ("alice", ""), ("", "")] {
            let submission = CredentialSubmission::new(username, password);
            for endpoint in [AuthEndpoint::Login, AuthEndpoint::Register] {
                let err = api.submit(endpoint, &submission).await.unwrap_err();
                assert_eq!(err.kind(), AuthFailureKind::ValidationError);
            }
        }
    }

    #[tokio::test]
    async fn test_missing_token_is_invalid_credentials() {
        let server = MockServer::start().await;
        mount_token(&server, LOGIN_PATH, serde_json::json!({}), 200).await;

        let api = ApiClient::new(server.uri()).unwrap();
        let err = api
            .login(&CredentialSubmission::new("alice", "wrong"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), AuthFailureKind::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_empty_token_with_400_is_invalid_credentials() {
        let server = MockServer::start().await;
        mount_token(&server, REGISTER_PATH, serde_json::json!({"access_token": ""}), 400).await;

        let api = ApiClient::new(server.uri()).unwrap();
        let err = api
            .register(&CredentialSubmission::new("alice", "taken"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthFailure::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_token_on_error_status_is_not_accepted() {
        let server = MockServer::start().await;
        mount_token(&server, LOGIN_PATH, serde_json::json!({"access_token": "tok"}), 401).await;

        let api = ApiClient::new(server.uri()).unwrap();
        let err = api
            .login(&CredentialSubmission::new("alice", "secret"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), AuthFailureKind::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_unparseable_body_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let err = api
            .login(&CredentialSubmission::new("alice", "secret"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthFailure::MalformedResponse(_)));
        assert_eq!(err.kind(), AuthFailureKind::NetworkError);
    }

    #[tokio::test]
    async fn test_server_error_is_network_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let err = api
            .login(&CredentialSubmission::new("alice", "secret"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), AuthFailureKind::NetworkError);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Bind then release a port so nothing is listening on it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = ApiClient::with_timeout(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let err = api
            .login(&CredentialSubmission::new("alice", "secret"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthFailure::Network(_)));
        assert_eq!(err.kind(), AuthFailureKind::NetworkError);
    }

    #[tokio::test]
    async fn test_failed_login_leaves_existing_session() {
        let server = MockServer::start().await;
        mount_token(&server, LOGIN_PATH, serde_json::json!({}), 200).await;

        let ctx = AuthContext::new(SessionStore::open_default(Arc::new(MemoryStorage::new())));
        let existing = Session::new("tok123", "alice");
        ctx.login(existing.clone()).unwrap();

        let api = ApiClient::new(server.uri()).unwrap();
        let result = api.login(&CredentialSubmission::new("alice", "wrong")).await;
        if let Ok(session) = result {
            ctx.login(session).unwrap();
        }

        assert_eq!(ctx.session(), Some(existing));
    }

    #[tokio::test]
    async fn test_concurrent_submissions_last_login_wins() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(body_json(serde_json::json!({"username": "slow", "password": "pw"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "slow-token"}))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .and(body_json(serde_json::json!({"username": "fast", "password": "pw"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "fast-token"})),
            )
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        let ctx = AuthContext::new(SessionStore::open_default(Arc::new(MemoryStorage::new())));

        let attempt = |username: &'static str| {
            let api = api.clone();
            let ctx = ctx.clone();
            async move {
                let session = api
                    .login(&CredentialSubmission::new(username, "pw"))
                    .await
                    .unwrap();
                ctx.login(session).unwrap();
            }
        };

        futures::join!(attempt("slow"), attempt("fast"));

        // The slow response resolves last, so its login runs last
        assert_eq!(ctx.token().as_deref(), Some("slow-token"));
    }

    #[tokio::test]
    async fn test_revoke_posts_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGOUT_PATH))
            .and(body_json(serde_json::json!({"token": "tok123"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "token blacklisted"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri()).unwrap();
        api.revoke("tok123").await.unwrap();
    }
}
