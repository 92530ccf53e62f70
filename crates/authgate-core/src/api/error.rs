use thiserror::Error;

/// Coarse classification of a failed credential submission, used by views
/// to choose what to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureKind {
    ValidationError,
    InvalidCredentials,
    NetworkError,
}

/// Why a register or login submission did not produce a session.
#[derive(Error, Debug)]
pub enum AuthFailure {
    #[error("Validation failed: {0}")]
    Validation(&'static str),

    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server error: status {0}")]
    ServerUnavailable(reqwest::StatusCode),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl AuthFailure {
    pub fn kind(&self) -> AuthFailureKind {
        match self {
            AuthFailure::Validation(_) => AuthFailureKind::ValidationError,
            AuthFailure::InvalidCredentials => AuthFailureKind::InvalidCredentials,
            AuthFailure::Network(_)
            | AuthFailure::ServerUnavailable(_)
            | AuthFailure::MalformedResponse(_) => AuthFailureKind::NetworkError,
        }
    }

    /// Message suitable for showing next to the login form
    pub fn user_message(&self) -> String {
        match self {
            AuthFailure::Validation(reason) => (*reason).to_string(),
            AuthFailure::InvalidCredentials => "Incorrect Username/Password".to_string(),
            AuthFailure::Network(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            AuthFailure::Network(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            AuthFailure::ServerUnavailable(_) | AuthFailure::MalformedResponse(_) => {
                "The server returned an unexpected response. Please try again.".to_string()
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Unauthorized - token may be expired")]
    AuthRejected,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => FetchError::AuthRejected,
            403 => FetchError::AccessDenied(truncated),
            404 => FetchError::NotFound(truncated),
            429 => FetchError::RateLimited,
            500..=599 => FetchError::ServerError(truncated),
            _ => FetchError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, FetchError::AuthRejected)
    }
}
