use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access token lifetime issued by the API server.
/// The server signs access tokens for 24 hours.
pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

/// The authenticated identity held by the client for the current login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    pub token: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
            issued_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.issued_at
    }

    /// Whether the session is older than `max_age`.
    /// Only consulted when rehydrating; a live session expires when the
    /// server rejects its token.
    pub fn is_expired(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }

    /// Get minutes remaining until `max_age` elapses (for display)
    pub fn minutes_until_expiry(&self, max_age: Duration) -> i64 {
        (max_age - self.age()).num_minutes().max(0)
    }
}

/// Authentication state as observed by subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticated(Session),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            AuthState::Anonymous => None,
        }
    }
}

impl From<Option<Session>> for AuthState {
    fn from(session: Option<Session>) -> Self {
        session.map_or(AuthState::Anonymous, AuthState::Authenticated)
    }
}
