use std::fmt;

use serde::Serialize;

/// Username and password as entered by the user.
///
/// Lives for a single submission attempt and is never persisted. The
/// serialized form is the request body expected by the register and
/// login endpoints.
#[derive(Clone, Serialize)]
pub struct CredentialSubmission {
    pub username: String,
    pub password: String,
}

impl CredentialSubmission {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the reason the submission cannot be sent, if any
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.is_empty() && self.password.is_empty() {
            Err("Username and password required")
        } else if self.username.is_empty() {
            Err("Username required")
        } else if self.password.is_empty() {
            Err("Password required")
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CredentialSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSubmission")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
