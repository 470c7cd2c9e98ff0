//! Backend configuration.
//!
//! The backend connection is described by two environment variables:
//! `SETU_BACKEND_URL` (base URL of the backend service) and
//! `SETU_BACKEND_KEY` (the public API key). When either is missing or the
//! URL does not parse, the application starts with the disabled adapter and
//! every data-dependent page shows the configuration notice instead.

use std::env;

use tracing::{info, warn};
use url::Url;

/// Environment variable holding the backend base URL.
pub const BACKEND_URL_VAR: &str = "SETU_BACKEND_URL";

/// Environment variable holding the backend public API key.
pub const BACKEND_KEY_VAR: &str = "SETU_BACKEND_KEY";

/// Connection settings for the HTTP backend adapter.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Base URL of the backend service, without a trailing slash.
    pub base_url: String,
    /// Public API key sent with every request.
    pub api_key: String,
}

impl BackendConfig {
    /// Builds a config from explicit values, returning `None` when either
    /// value is empty or the URL is invalid.
    pub fn from_parts(url: &str, api_key: &str) -> Option<Self> {
        if url.is_empty() || api_key.is_empty() {
            return None;
        }
        if Url::parse(url).is_err() {
            warn!("Backend URL is not a valid URL: {url}");
            return None;
        }
        Some(Self {
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Reads the backend configuration from the environment.
    ///
    /// Returns `None` when the backend is unconfigured; callers select the
    /// disabled adapter in that case, once, at startup.
    pub fn from_env() -> Option<Self> {
        let url = env::var(BACKEND_URL_VAR).unwrap_or_default();
        let key = env::var(BACKEND_KEY_VAR).unwrap_or_default();

        match Self::from_parts(&url, &key) {
            Some(config) => {
                info!("Backend configured at {}", config.base_url);
                Some(config)
            }
            None => {
                warn!("Backend connection not configured ({BACKEND_URL_VAR}/{BACKEND_KEY_VAR})");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = BackendConfig::from_parts("https://backend.example.com/", "anon-key")
            .expect("config should parse");
        assert_eq!(config.base_url, "https://backend.example.com");
        assert_eq!(config.api_key, "anon-key");
    }

    #[test]
    fn test_missing_values_rejected() {
        assert!(BackendConfig::from_parts("", "anon-key").is_none());
        assert!(BackendConfig::from_parts("https://backend.example.com", "").is_none());
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(BackendConfig::from_parts("not a url", "anon-key").is_none());
    }
}
