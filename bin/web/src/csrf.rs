//! CSRF protection for the SikshaSetu web interface.
//!
//! Session-scoped tokens: each browser session gets one token, every POST
//! form echoes it back, and handlers reject mismatches before doing any
//! work.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, warn};
use uuid::Uuid;

/// In-memory token store, keyed by session id.
#[derive(Clone, Default)]
pub struct CsrfStore {
    tokens: Arc<RwLock<HashMap<String, String>>>,
}

impl CsrfStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, session_id: &str) -> Option<String> {
        let tokens = self.tokens.read().unwrap_or_else(|p| p.into_inner());
        tokens.get(session_id).cloned()
    }

    fn issue(&self, session_id: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let mut tokens = self.tokens.write().unwrap_or_else(|p| p.into_inner());
        tokens.insert(session_id.to_string(), token.clone());
        token
    }

    fn matches(&self, session_id: &str, token: &str) -> bool {
        self.get(session_id).is_some_and(|stored| stored == token)
    }
}

/// Returns the session's CSRF token, creating the session and token on
/// first use.
pub async fn csrf_token(session: &Session, store: &CsrfStore) -> String {
    let session_id = match session.id() {
        Some(id) => id.to_string(),
        None => {
            // Commit the session so it gets an id to key the token by.
            if let Err(e) = session.insert("initialized", true).await {
                error!("Failed to initialize session: {e}");
                return String::new();
            }
            if let Err(e) = session.save().await {
                error!("Failed to save session: {e}");
                return String::new();
            }
            match session.id() {
                Some(id) => id.to_string(),
                None => {
                    error!("Session has no id after save");
                    return String::new();
                }
            }
        }
    };

    match store.get(&session_id) {
        Some(token) => token,
        None => store.issue(&session_id),
    }
}

/// Validates the token a form posted back against the session's token.
pub fn validate_csrf(session: &Session, store: &CsrfStore, token: &str) -> bool {
    let valid = session
        .id()
        .map(|id| store.matches(&id.to_string(), token))
        .unwrap_or(false);
    if !valid {
        warn!("CSRF token mismatch");
    }
    valid
}

/// Form wrapper carrying the CSRF token alongside the payload.
#[derive(Debug, Deserialize)]
pub struct CsrfForm<T> {
    pub csrf_token: String,
    #[serde(flatten)]
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_match() {
        let store = CsrfStore::new();
        let token = store.issue("session-1");
        assert!(store.matches("session-1", &token));
        assert!(!store.matches("session-1", "other"));
        assert!(!store.matches("session-2", &token));
    }

    #[test]
    fn test_reissue_replaces_token() {
        let store = CsrfStore::new();
        let first = store.issue("session-1");
        let second = store.issue("session-1");
        assert!(!store.matches("session-1", &first));
        assert!(store.matches("session-1", &second));
    }
}
