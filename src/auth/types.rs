// Authentication types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Short-lived bearer token authorizing admin API calls.
///
/// Held only in process memory; the durable session proof lives in the
/// server-managed cookie and is never handled here directly.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Raw token for the Authorization header.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Header value in `Bearer <token>` form.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

// Keep tokens out of logs and error output.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Denormalized profile of the signed-in administrator.
///
/// Display data only. It is cached for warm-start UI and must never be used
/// to authorize a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Login request body
#[derive(Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response shape shared by the login and refresh endpoints
#[derive(Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub admin: IdentitySnapshot,
}

/// Identity snapshot as persisted in the warm-start cache file
#[derive(Serialize, Deserialize)]
pub struct CachedIdentity {
    pub admin: IdentitySnapshot,
    pub cached_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_redacts_token() {
        let cred = Credential::new("super-secret-token");
        let rendered = format!("{:?}", cred);
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_bearer_format() {
        let cred = Credential::new("abc123");
        assert_eq!(cred.bearer(), "Bearer abc123");
        assert_eq!(cred.token(), "abc123");
    }

    #[test]
    fn test_session_response_parsing() {
        let json = r#"{
            "token": "tok-1",
            "admin": {"name": "Admin", "email": "admin@store.test", "role": "superadmin"}
        }"#;
        let parsed: SessionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.token, "tok-1");
        assert_eq!(parsed.admin.role, "superadmin");
    }
}
