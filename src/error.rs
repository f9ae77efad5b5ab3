// Error handling module
// Defines the error taxonomy surfaced by the request pipeline

use thiserror::Error;

/// Errors that can occur while issuing admin API requests
#[derive(Error, Debug)]
pub enum ApiError {
    /// Terminal authentication failure: the session could not be refreshed
    /// or the server rejected a freshly refreshed credential
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Business failure from the API, propagated verbatim for page-level
    /// display; this layer does not interpret it
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Network or transport failure; never retried at this layer
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Internal client error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// True for terminal authentication failures.
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// HTTP status carried by the error, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

// A failed refresh is a terminal authentication failure by the time it
// reaches a caller.
impl From<crate::auth::RefreshFailure> for ApiError {
    fn from(failure: crate::auth::RefreshFailure) -> Self {
        ApiError::Unauthorized(failure.to_string())
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ApiError::Unauthorized("session expired".to_string());
        assert_eq!(err.to_string(), "Authentication failed: session expired");

        let err = ApiError::Api {
            status: 422,
            message: "Product name is required".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 422 - Product name is required");
    }

    #[test]
    fn test_internal_error_message() {
        let err = ApiError::Internal(anyhow::anyhow!("something went wrong"));
        assert_eq!(err.to_string(), "Internal error: something went wrong");
    }

    #[test]
    fn test_is_auth() {
        assert!(ApiError::Unauthorized("expired".to_string()).is_auth());
        assert!(!ApiError::Api {
            status: 500,
            message: "boom".to_string()
        }
        .is_auth());
    }

    #[test]
    fn test_status() {
        let err = ApiError::Api {
            status: 404,
            message: "not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));

        assert_eq!(ApiError::Unauthorized("expired".to_string()).status(), None);
    }
}
