//! In-process backend adapter.
//!
//! Backs the integration suite and the web interface's demo mode with
//! plain in-memory maps. Behavior mirrors the HTTP adapter's contract:
//! the same error messages for duplicate accounts and bad credentials,
//! uuid identifiers, author joins resolved on read, and a change event
//! emitted after every successful mutation.
//!
//! This is a functional stand-in, not a security boundary: passwords are
//! held as plain strings and nothing survives the process.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{AuthFailure, Result, SetuError};
use crate::post::{NewPost, Post, PostBody, PostType};
use crate::profile::{NewProfile, UserProfile, VerificationStatus};
use crate::session::AuthSession;
use crate::verification::UploadedDocument;

use super::{DocumentStore, IdentityApi, PostChange, PostStore, ProfileStore};

#[derive(Clone, Debug)]
struct StoredAccount {
    user_id: String,
    password: String,
}

#[derive(Clone, Debug)]
struct StoredDocument {
    user_id: String,
    file_name: String,
    content_type: String,
    size: usize,
}

#[derive(Default)]
struct Store {
    /// Accounts keyed by email.
    accounts: HashMap<String, StoredAccount>,
    /// Profiles keyed by user id.
    profiles: HashMap<String, UserProfile>,
    /// Posts keyed by post id.
    posts: HashMap<String, Post>,
    documents: Vec<StoredDocument>,
}

/// In-memory implementation of all four collaborator interfaces.
pub struct MemoryBackend {
    store: RwLock<Store>,
    changes: broadcast::Sender<PostChange>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            store: RwLock::new(Store::default()),
            changes,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(|p| p.into_inner())
    }

    fn notify(&self, change: PostChange) {
        // No subscribers is fine; the send result only reports that.
        let _ = self.changes.send(change);
    }

    /// Number of stored verification documents, for assertions in tests.
    pub fn document_count(&self) -> usize {
        self.read().documents.len()
    }

    /// Marks a student as verified, standing in for the out-of-scope
    /// external review step.
    pub fn approve_verification(&self, user_id: &str) {
        let mut store = self.write();
        if let Some(profile) = store.profiles.get_mut(user_id) {
            profile.verification_status = VerificationStatus::Verified;
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityApi for MemoryBackend {
    async fn register(&self, email: &str, password: &str) -> Result<AuthSession> {
        let mut store = self.write();
        if store.accounts.contains_key(email) {
            return Err(SetuError::auth(
                AuthFailure::AccountExists,
                "An account with this email already exists. Try signing in instead.",
            ));
        }

        let user_id = Uuid::new_v4().to_string();
        store.accounts.insert(
            email.to_string(),
            StoredAccount {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );

        Ok(AuthSession {
            user_id,
            email: email.to_string(),
            access_token: Uuid::new_v4().to_string(),
        })
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let store = self.read();
        match store.accounts.get(email) {
            Some(account) if account.password == password => Ok(AuthSession {
                user_id: account.user_id.clone(),
                email: email.to_string(),
                access_token: Uuid::new_v4().to_string(),
            }),
            _ => Err(SetuError::auth(
                AuthFailure::InvalidCredentials,
                "Invalid email or password",
            )),
        }
    }

    async fn logout(&self, _session: &AuthSession) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn create_profile(&self, profile: NewProfile) -> Result<()> {
        let mut store = self.write();
        if store.profiles.contains_key(&profile.id) {
            return Err(SetuError::auth(
                AuthFailure::AccountExists,
                "An account with this email already exists. Try signing in instead.",
            ));
        }
        store.profiles.insert(
            profile.id.clone(),
            UserProfile {
                id: profile.id,
                email: profile.email,
                username: profile.username,
                role: profile.role,
                verification_status: profile.verification_status,
                bio: None,
                organization: None,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>> {
        Ok(self.read().profiles.get(id).cloned())
    }

    async fn set_verification_status(&self, id: &str, status: VerificationStatus) -> Result<()> {
        let mut store = self.write();
        let profile = store
            .profiles
            .get_mut(id)
            .ok_or(SetuError::NotFound("Profile"))?;
        profile.verification_status = status;
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemoryBackend {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        let store = self.read();
        let mut posts: Vec<Post> = store
            .posts
            .values()
            .cloned()
            .map(|mut post| {
                post.author = store.profiles.get(&post.user_id).cloned();
                post
            })
            .collect();
        crate::post::sort_feed(&mut posts);
        Ok(posts)
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let store = self.read();
        Ok(store.posts.get(id).cloned().map(|mut post| {
            post.author = store.profiles.get(&post.user_id).cloned();
            post
        }))
    }

    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let mut store = self.write();
        let stored = Post {
            id: Uuid::new_v4().to_string(),
            user_id: post.user_id.clone(),
            body: post.body,
            author: store.profiles.get(&post.user_id).cloned(),
            created_at: Utc::now(),
        };
        store.posts.insert(stored.id.clone(), stored.clone());
        drop(store);
        self.notify(PostChange::Inserted);
        Ok(stored)
    }

    async fn update_post(&self, id: &str, body: PostBody) -> Result<()> {
        let mut store = self.write();
        let post = store.posts.get_mut(id).ok_or(SetuError::NotFound("Post"))?;
        if post.body.post_type() != body.post_type() {
            return Err(SetuError::storage("Post type mismatch on update"));
        }
        post.body = body;
        drop(store);
        self.notify(PostChange::Updated);
        Ok(())
    }

    async fn delete_post(&self, id: &str) -> Result<()> {
        let mut store = self.write();
        store.posts.remove(id).ok_or(SetuError::NotFound("Post"))?;
        drop(store);
        self.notify(PostChange::Deleted);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PostChange> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn upload(&self, user_id: &str, document: UploadedDocument) -> Result<()> {
        let mut store = self.write();
        store.documents.push(StoredDocument {
            user_id: user_id.to_string(),
            file_name: document.file_name,
            content_type: document.content_type,
            size: document.bytes.len(),
        });
        Ok(())
    }
}

// Silence the unused-field lint surface for the document metadata we keep
// only for inspection in tests.
impl StoredDocument {
    #[cfg(test)]
    fn matches(&self, user_id: &str) -> bool {
        self.user_id == user_id
            && !self.file_name.is_empty()
            && !self.content_type.is_empty()
            && self.size > 0
    }
}
