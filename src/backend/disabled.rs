//! Disabled backend adapter.
//!
//! Selected once at startup when the process has no backend configuration.
//! Every operation fails with [`SetuError::BackendUnavailable`]; the change
//! stream stays open but never fires, so the feed synchronizer idles
//! instead of exiting.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{Result, SetuError};
use crate::post::{NewPost, Post, PostBody};
use crate::profile::{NewProfile, UserProfile, VerificationStatus};
use crate::session::AuthSession;
use crate::verification::UploadedDocument;

use super::{DocumentStore, IdentityApi, PostChange, PostStore, ProfileStore};

/// Adapter standing in for an unconfigured backend.
pub struct DisabledBackend {
    // Held so subscribers see an open-but-silent channel.
    changes: broadcast::Sender<PostChange>,
}

impl DisabledBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self { changes }
    }
}

impl Default for DisabledBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityApi for DisabledBackend {
    async fn register(&self, _email: &str, _password: &str) -> Result<AuthSession> {
        Err(SetuError::BackendUnavailable)
    }

    async fn login(&self, _email: &str, _password: &str) -> Result<AuthSession> {
        Err(SetuError::BackendUnavailable)
    }

    async fn logout(&self, _session: &AuthSession) -> Result<()> {
        Err(SetuError::BackendUnavailable)
    }
}

#[async_trait]
impl ProfileStore for DisabledBackend {
    async fn create_profile(&self, _profile: NewProfile) -> Result<()> {
        Err(SetuError::BackendUnavailable)
    }

    async fn get_profile(&self, _id: &str) -> Result<Option<UserProfile>> {
        Err(SetuError::BackendUnavailable)
    }

    async fn set_verification_status(
        &self,
        _id: &str,
        _status: VerificationStatus,
    ) -> Result<()> {
        Err(SetuError::BackendUnavailable)
    }
}

#[async_trait]
impl PostStore for DisabledBackend {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        Err(SetuError::BackendUnavailable)
    }

    async fn get_post(&self, _id: &str) -> Result<Option<Post>> {
        Err(SetuError::BackendUnavailable)
    }

    async fn create_post(&self, _post: NewPost) -> Result<Post> {
        Err(SetuError::BackendUnavailable)
    }

    async fn update_post(&self, _id: &str, _body: PostBody) -> Result<()> {
        Err(SetuError::BackendUnavailable)
    }

    async fn delete_post(&self, _id: &str) -> Result<()> {
        Err(SetuError::BackendUnavailable)
    }

    fn subscribe(&self) -> broadcast::Receiver<PostChange> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl DocumentStore for DisabledBackend {
    async fn upload(&self, _user_id: &str, _document: UploadedDocument) -> Result<()> {
        Err(SetuError::BackendUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_operation_reports_unavailable() {
        let backend = DisabledBackend::new();

        assert!(matches!(
            backend.login("a@b.com", "secret123").await,
            Err(SetuError::BackendUnavailable)
        ));
        assert!(matches!(
            backend.list_posts().await,
            Err(SetuError::BackendUnavailable)
        ));
        assert!(matches!(
            backend.get_profile("user-1").await,
            Err(SetuError::BackendUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_change_stream_stays_open_and_silent() {
        let backend = DisabledBackend::new();
        let mut receiver = backend.subscribe();
        assert!(matches!(
            receiver.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
