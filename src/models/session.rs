use serde::{Deserialize, Serialize};

/// The persisted portal session.
///
/// Every string field holds an encrypted blob (`base64(nonce || ciphertext)`),
/// never plaintext. `username`/`password` are only present when the user asked
/// to be remembered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Encrypted `"; "`-joined cookie string.
    pub cookies: String,
    /// Milliseconds since the epoch when the session was last known good.
    pub last_validated: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// A decrypted session, held in memory only.
#[derive(Clone, PartialEq)]
pub struct StoredSession {
    pub cookies: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl StoredSession {
    /// Remembered credentials, when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        }
    }
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("cookies", &format_args!("<{} bytes>", self.cookies.len()))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// The outcome of a login attempt as reported to callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginResult {
    pub fn success(cookies: String) -> Self {
        Self {
            success: true,
            cookies: Some(cookies),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            cookies: None,
            error: Some(error.into()),
        }
    }
}
