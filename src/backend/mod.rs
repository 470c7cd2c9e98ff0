//! Storage collaborator interfaces and adapter selection.
//!
//! Everything interesting — persistence, auth, binary storage, change
//! notification — is delegated to an external backend service. This module
//! defines the four collaborator traits the core consumes and bundles them
//! into a [`Backend`] handle. The adapter is chosen exactly once at startup
//! from [`BackendConfig`]: a configured process gets the HTTP adapter,
//! anything else gets the disabled adapter whose every operation reports
//! the configuration notice. No call site branches on configuration.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::BackendConfig;
use crate::error::Result;
use crate::post::{NewPost, Post, PostBody};
use crate::profile::{NewProfile, UserProfile, VerificationStatus};
use crate::session::AuthSession;
use crate::verification::UploadedDocument;

mod disabled;
mod http;
mod memory;

pub use disabled::DisabledBackend;
pub use http::HttpBackend;
pub use memory::MemoryBackend;

/// A change to the post collection.
///
/// Events are broad, topic-level notifications: the feed synchronizer
/// refetches the whole list on any of them and never applies a payload
/// incrementally, so the variants exist for logging rather than merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostChange {
    Inserted,
    Updated,
    Deleted,
    /// The remote collection changed outside this client.
    External,
}

/// Identity collaborator: credentials and sessions.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Creates an identity record and returns its session.
    async fn register(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// Exchanges credentials for a session.
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// Ends the given session.
    async fn logout(&self, session: &AuthSession) -> Result<()>;
}

/// Profile collaborator: one record per identity.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn create_profile(&self, profile: NewProfile) -> Result<()>;

    /// Fetches a profile; `Ok(None)` means the identity has no profile —
    /// the recoverable half-registered state, not an error.
    async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>>;

    async fn set_verification_status(&self, id: &str, status: VerificationStatus) -> Result<()>;
}

/// Post collaborator: the shared feed collection.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Full ordered listing with the author join resolved.
    async fn list_posts(&self) -> Result<Vec<Post>>;

    async fn get_post(&self, id: &str) -> Result<Option<Post>>;

    async fn create_post(&self, post: NewPost) -> Result<Post>;

    /// Replaces the variant field group of an existing post. The post type
    /// never changes; callers enforce that before reaching the store.
    async fn update_post(&self, id: &str, body: PostBody) -> Result<()>;

    async fn delete_post(&self, id: &str) -> Result<()>;

    /// Subscribes to the unfiltered change stream for the post collection.
    fn subscribe(&self) -> broadcast::Receiver<PostChange>;
}

/// Verification document collaborator.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores a verification document under the user's folder. Size and
    /// MIME constraints are enforced by the caller before upload.
    async fn upload(&self, user_id: &str, document: UploadedDocument) -> Result<()>;
}

/// The bundled collaborator handles the application runs against.
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityApi>,
    pub profiles: Arc<dyn ProfileStore>,
    pub posts: Arc<dyn PostStore>,
    pub documents: Arc<dyn DocumentStore>,
    available: bool,
}

impl Backend {
    /// Selects the adapter from the environment, once, at startup.
    pub fn from_env() -> Self {
        Self::from_config(BackendConfig::from_env())
    }

    /// Selects the adapter for the given configuration.
    pub fn from_config(config: Option<BackendConfig>) -> Self {
        match config {
            Some(config) => Self::http(config),
            None => Self::disabled(),
        }
    }

    /// Real adapter against the remote backend service.
    pub fn http(config: BackendConfig) -> Self {
        let adapter = Arc::new(HttpBackend::new(config));
        adapter.spawn_change_poller();
        info!("Using HTTP backend adapter");
        Self {
            identity: adapter.clone(),
            profiles: adapter.clone(),
            posts: adapter.clone(),
            documents: adapter,
            available: true,
        }
    }

    /// Stub adapter for an unconfigured process: every data operation
    /// fails with the configuration notice while static pages still render.
    pub fn disabled() -> Self {
        let adapter = Arc::new(DisabledBackend::new());
        info!("Backend not configured; using disabled adapter");
        Self {
            identity: adapter.clone(),
            profiles: adapter.clone(),
            posts: adapter.clone(),
            documents: adapter,
            available: false,
        }
    }

    /// In-process adapter backing the test suite and demo mode.
    pub fn memory() -> Self {
        Self::with_memory(Arc::new(MemoryBackend::new()))
    }

    /// Wraps an existing in-memory adapter, so callers can keep a concrete
    /// handle to it (tests use this to stand in for the external review
    /// step).
    pub fn with_memory(adapter: Arc<MemoryBackend>) -> Self {
        Self {
            identity: adapter.clone(),
            profiles: adapter.clone(),
            posts: adapter.clone(),
            documents: adapter,
            available: true,
        }
    }

    /// False when the disabled adapter is active.
    pub fn is_available(&self) -> bool {
        self.available
    }
}
