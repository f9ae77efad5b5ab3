use anyhow::Result;
use std::path::PathBuf;

use crate::auth::default_cache_path;

/// Client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the admin API, without a trailing slash
    pub base_url: String,

    /// Connect timeout in seconds
    pub connect_timeout: u64,

    /// Request timeout in seconds; refresh and replayed calls inherit it
    pub request_timeout: u64,

    /// Where the identity warm-start cache lives; `None` disables it
    pub identity_cache_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Configuration with defaults for the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            connect_timeout: 10,
            request_timeout: 15,
            identity_cache_path: default_cache_path(),
        }
    }

    /// Load configuration from the environment with defaults.
    pub fn from_env() -> Self {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let base_url = std::env::var("ADMIN_API_URL")
            .unwrap_or_else(|_| "http://localhost:3001".to_string());

        let mut config = Self::new(base_url);

        if let Some(secs) = std::env::var("HTTP_CONNECT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.connect_timeout = secs;
        }

        if let Some(secs) = std::env::var("HTTP_REQUEST_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.request_timeout = secs;
        }

        if let Ok(path) = std::env::var("IDENTITY_CACHE_FILE") {
            config.identity_cache_path = Some(PathBuf::from(path));
        }

        config
    }

    /// Override the identity cache location (`None` disables caching).
    pub fn with_identity_cache(mut self, path: Option<PathBuf>) -> Self {
        self.identity_cache_path = path;
        self
    }

    /// Override the request timeout.
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout = secs;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("ADMIN_API_URL must be an http(s) URL: {}", self.base_url);
        }

        if self.request_timeout == 0 || self.connect_timeout == 0 {
            anyhow::bail!("Timeouts must be non-zero");
        }

        Ok(())
    }
}

/// Strip a trailing slash so paths from the endpoint catalog join cleanly
fn normalize_base_url(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:3001/".to_string()),
            "http://localhost:3001"
        );
        assert_eq!(
            normalize_base_url("http://localhost:3001".to_string()),
            "http://localhost:3001"
        );
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("https://api.store.test");
        assert_eq!(config.connect_timeout, 10);
        assert_eq!(config.request_timeout, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let config = ClientConfig::new("ftp://api.store.test");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ClientConfig::new("https://api.store.test").with_request_timeout(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::new("https://api.store.test")
            .with_identity_cache(None)
            .with_request_timeout(30);
        assert!(config.identity_cache_path.is_none());
        assert_eq!(config.request_timeout, 30);
    }
}
