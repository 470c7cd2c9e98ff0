//! HTTP backend adapter.
//!
//! Speaks the backend service's REST surface: `auth/v1` for identity,
//! `rest/v1` for profiles and posts (with the author join resolved
//! server-side), `storage/v1` for verification documents. Collaborator
//! error text is mapped to the fixed user-facing taxonomy at this boundary
//! and never shown raw.
//!
//! The service's push stream is stood in for by a background poll task
//! that watches a cheap id digest of the post collection and emits a
//! change event when it moves; local mutations emit their events
//! immediately. Subscribers treat both identically (full refetch).

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::config::BackendConfig;
use crate::error::{AuthFailure, Result, SetuError};
use crate::post::{NewPost, Post, PostBody, PostType, ResourceCategory};
use crate::profile::{NewProfile, UserProfile, VerificationStatus};
use crate::session::AuthSession;
use crate::verification::UploadedDocument;

use super::{DocumentStore, IdentityApi, PostChange, PostStore, ProfileStore};

/// Bucket holding verification documents.
const VERIFICATION_BUCKET: &str = "verification-uploads";

/// Interval between change-detection polls.
const CHANGE_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// REST adapter for the remote backend service.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    api_key: String,
    /// Access token of the signed-in session, mirrored here so row-level
    /// authorization travels with every request the way the original
    /// client SDK's ambient session did.
    auth_token: RwLock<Option<String>>,
    changes: broadcast::Sender<PostChange>,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            client: Client::new(),
            base_url: config.base_url,
            api_key: config.api_key,
            auth_token: RwLock::new(None),
            changes,
        }
    }

    fn bearer(&self) -> String {
        let token = self.auth_token.read().unwrap_or_else(|p| p.into_inner());
        format!("Bearer {}", token.as_deref().unwrap_or(&self.api_key))
    }

    fn set_token(&self, token: Option<String>) {
        *self.auth_token.write().unwrap_or_else(|p| p.into_inner()) = token;
    }

    fn notify(&self, change: PostChange) {
        let _ = self.changes.send(change);
    }

    /// Spawns the poll task standing in for the push change stream.
    pub fn spawn_change_poller(self: &Arc<Self>) {
        let adapter = Arc::clone(self);
        tokio::spawn(async move {
            let mut last_digest: Option<String> = None;
            loop {
                tokio::time::sleep(CHANGE_POLL_INTERVAL).await;
                match adapter.fetch_digest().await {
                    Ok(digest) => {
                        if let Some(previous) = &last_digest {
                            if *previous != digest {
                                debug!("Remote post collection changed");
                                adapter.notify(PostChange::External);
                            }
                        }
                        last_digest = Some(digest);
                    }
                    Err(e) => {
                        // Transient; the next tick retries.
                        warn!("Change poll failed: {e}");
                    }
                }
            }
        });
    }

    /// Fetches a cheap fingerprint of the post collection.
    async fn fetch_digest(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct IdRow {
            id: String,
        }

        let url = format!(
            "{}/rest/v1/posts?select=id&order=created_at.desc,id.desc",
            self.base_url
        );
        let response = self.get(&url).await?;
        let rows: Vec<IdRow> = response.json().await.map_err(transport)?;
        Ok(digest_ids(rows.iter().map(|r| r.id.as_str())))
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(transport)?;
        check_rest(response).await
    }

    async fn auth_call(&self, path: &str, payload: serde_json::Value) -> Result<AuthResponse> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;

        if response.status().is_success() {
            return response.json().await.map_err(transport);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_auth_error(&body))
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    access_token: Option<String>,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl AuthResponse {
    fn into_session(self, fallback_email: &str) -> AuthSession {
        AuthSession {
            user_id: self.user.id,
            email: self.user.email.unwrap_or_else(|| fallback_email.to_string()),
            access_token: self.access_token.unwrap_or_default(),
        }
    }
}

/// A post row as stored by the collaborator: flat nullable columns.
#[derive(Debug, Deserialize)]
struct PostRow {
    id: String,
    user_id: String,
    post_type: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    resource_title: Option<String>,
    #[serde(default)]
    resource_category: Option<String>,
    #[serde(default)]
    resource_contact: Option<String>,
    created_at: DateTime<Utc>,
    /// Author join, named after the joined relation.
    #[serde(default)]
    profiles: Option<UserProfile>,
}

impl TryFrom<PostRow> for Post {
    type Error = SetuError;

    /// Rejects partial rows: a post's type determines exactly which field
    /// group must be populated, and nothing half-empty may surface.
    fn try_from(row: PostRow) -> Result<Post> {
        let malformed = || SetuError::storage(format!("Malformed post record {}", row.id));

        let body = match row.post_type.parse::<PostType>().map_err(|_| malformed())? {
            PostType::Wisdom => PostBody::Wisdom {
                content: row.content.clone().ok_or_else(malformed)?,
            },
            PostType::Donation => PostBody::Donation {
                resource_title: row.resource_title.clone().ok_or_else(malformed)?,
                resource_category: row
                    .resource_category
                    .as_deref()
                    .ok_or_else(malformed)?
                    .parse::<ResourceCategory>()
                    .map_err(|_| malformed())?,
                resource_contact: row.resource_contact.clone().ok_or_else(malformed)?,
            },
        };

        Ok(Post {
            id: row.id,
            user_id: row.user_id,
            body,
            author: row.profiles,
            created_at: row.created_at,
        })
    }
}

/// Flat column encoding for inserts.
#[derive(Debug, Serialize)]
struct PostInsert<'a> {
    user_id: &'a str,
    post_type: PostType,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_category: Option<ResourceCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_contact: Option<&'a str>,
}

/// Flat column encoding for edits: variant fields only, full replacement.
#[derive(Debug, Serialize)]
struct PostPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_category: Option<ResourceCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_contact: Option<&'a str>,
}

impl<'a> PostPatch<'a> {
    fn from_body(body: &'a PostBody) -> Self {
        match body {
            PostBody::Wisdom { content } => Self {
                content: Some(content),
                resource_title: None,
                resource_category: None,
                resource_contact: None,
            },
            PostBody::Donation {
                resource_title,
                resource_category,
                resource_contact,
            } => Self {
                content: None,
                resource_title: Some(resource_title),
                resource_category: Some(*resource_category),
                resource_contact: Some(resource_contact),
            },
        }
    }
}

impl<'a> PostInsert<'a> {
    fn new(post: &'a NewPost) -> Self {
        let patch = PostPatch::from_body(&post.body);
        Self {
            user_id: &post.user_id,
            post_type: post.body.post_type(),
            content: patch.content,
            resource_title: patch.resource_title,
            resource_category: patch.resource_category,
            resource_contact: patch.resource_contact,
        }
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Maps a transport failure. An unreachable host is a configuration
/// problem, not a transient storage failure.
fn transport(e: reqwest::Error) -> SetuError {
    if e.is_connect() || e.is_timeout() {
        SetuError::BackendUnavailable
    } else {
        SetuError::storage(e.to_string())
    }
}

/// Maps a raw collaborator auth message onto the fixed user-facing set.
/// Unrecognized messages collapse into a generic failure; the raw text
/// only ever reaches the diagnostic log.
fn classify_auth_error(raw: &str) -> SetuError {
    warn!("Auth request rejected: {raw}");
    if raw.contains("Invalid login credentials") {
        SetuError::auth(AuthFailure::InvalidCredentials, "Invalid email or password")
    } else if raw.contains("User already registered") || raw.contains("duplicate key value") {
        SetuError::auth(
            AuthFailure::AccountExists,
            "An account with this email already exists. Try signing in instead.",
        )
    } else if raw.contains("Email not confirmed") {
        SetuError::auth(
            AuthFailure::EmailUnconfirmed,
            "Please check your email and confirm your account",
        )
    } else {
        SetuError::auth(AuthFailure::Other, "Authentication failed")
    }
}

/// Converts a non-success REST response into a simplified storage error,
/// keeping the body in the diagnostic log only.
async fn check_rest(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!("Backend request failed with {status}: {body}");
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(SetuError::storage("The backend rejected the request"))
    } else {
        Err(SetuError::storage(format!(
            "The backend returned status {}",
            status.as_u16()
        )))
    }
}

fn digest_ids<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let mut digest = String::new();
    for id in ids {
        digest.push_str(id);
        digest.push('\n');
    }
    digest
}

// =============================================================================
// Collaborator Implementations
// =============================================================================

#[async_trait]
impl IdentityApi for HttpBackend {
    #[instrument(skip(self, password))]
    async fn register(&self, email: &str, password: &str) -> Result<AuthSession> {
        let response = self
            .auth_call(
                "/auth/v1/signup",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        let session = response.into_session(email);
        self.set_token(Some(session.access_token.clone()));
        info!("Registered identity {}", session.user_id);
        Ok(session)
    }

    #[instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let response = self
            .auth_call(
                "/auth/v1/token?grant_type=password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        let session = response.into_session(email);
        self.set_token(Some(session.access_token.clone()));
        Ok(session)
    }

    async fn logout(&self, _session: &AuthSession) -> Result<()> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let result = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.bearer())
            .send()
            .await;
        self.set_token(None);
        result.map_err(transport)?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for HttpBackend {
    async fn create_profile(&self, profile: NewProfile) -> Result<()> {
        let url = format!("{}/rest/v1/profiles", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.bearer())
            .header("Prefer", "return=minimal")
            .json(&profile)
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_auth_error(&body));
        }
        check_rest(response).await?;
        Ok(())
    }

    async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>> {
        let url = format!("{}/rest/v1/profiles?id=eq.{id}&select=*", self.base_url);
        let response = self.get(&url).await?;
        let mut rows: Vec<UserProfile> = response.json().await.map_err(transport)?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn set_verification_status(&self, id: &str, status: VerificationStatus) -> Result<()> {
        let url = format!("{}/rest/v1/profiles?id=eq.{id}", self.base_url);
        let response = self
            .client
            .patch(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.bearer())
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "verification_status": status }))
            .send()
            .await
            .map_err(transport)?;
        check_rest(response).await?;
        Ok(())
    }
}

#[async_trait]
impl PostStore for HttpBackend {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        let url = format!(
            "{}/rest/v1/posts?select=*,profiles(*)&order=created_at.desc,id.desc",
            self.base_url
        );
        let response = self.get(&url).await?;
        let rows: Vec<PostRow> = response.json().await.map_err(transport)?;
        rows.into_iter().map(Post::try_from).collect()
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let url = format!(
            "{}/rest/v1/posts?id=eq.{id}&select=*,profiles(*)",
            self.base_url
        );
        let response = self.get(&url).await?;
        let mut rows: Vec<PostRow> = response.json().await.map_err(transport)?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Post::try_from(rows.swap_remove(0)).map(Some)
        }
    }

    #[instrument(skip(self, post), fields(user_id = %post.user_id))]
    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let url = format!("{}/rest/v1/posts?select=*,profiles(*)", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.bearer())
            .header("Prefer", "return=representation")
            .json(&PostInsert::new(&post))
            .send()
            .await
            .map_err(transport)?;
        let response = check_rest(response).await?;

        let mut rows: Vec<PostRow> = response.json().await.map_err(transport)?;
        if rows.is_empty() {
            return Err(SetuError::storage("Backend returned no created record"));
        }
        let created = Post::try_from(rows.swap_remove(0))?;
        self.notify(PostChange::Inserted);
        Ok(created)
    }

    async fn update_post(&self, id: &str, body: PostBody) -> Result<()> {
        let url = format!("{}/rest/v1/posts?id=eq.{id}", self.base_url);
        let response = self
            .client
            .patch(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.bearer())
            .header("Prefer", "return=minimal")
            .json(&PostPatch::from_body(&body))
            .send()
            .await
            .map_err(transport)?;
        check_rest(response).await?;
        self.notify(PostChange::Updated);
        Ok(())
    }

    async fn delete_post(&self, id: &str) -> Result<()> {
        let url = format!("{}/rest/v1/posts?id=eq.{id}", self.base_url);
        let response = self
            .client
            .delete(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(transport)?;
        check_rest(response).await?;
        self.notify(PostChange::Deleted);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PostChange> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl DocumentStore for HttpBackend {
    #[instrument(skip(self, document), fields(file = %document.file_name))]
    async fn upload(&self, user_id: &str, document: UploadedDocument) -> Result<()> {
        let object_path = format!(
            "{user_id}/{}-{}",
            Utc::now().timestamp_millis(),
            document.file_name
        );
        let url = format!(
            "{}/storage/v1/object/{VERIFICATION_BUCKET}/{object_path}",
            self.base_url
        );
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", self.bearer())
            .header("Content-Type", document.content_type)
            .body(document.bytes)
            .send()
            .await
            .map_err(transport)?;
        check_rest(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_row(post_type: &str) -> PostRow {
        PostRow {
            id: "post-1".to_string(),
            user_id: "user-1".to_string(),
            post_type: post_type.to_string(),
            content: None,
            resource_title: None,
            resource_category: None,
            resource_contact: None,
            created_at: Utc::now(),
            profiles: None,
        }
    }

    #[test]
    fn test_auth_error_mapping() {
        let err = classify_auth_error("AuthApiError: Invalid login credentials");
        assert_eq!(err.auth_failure(), Some(AuthFailure::InvalidCredentials));
        assert_eq!(err.to_string(), "Invalid email or password");

        let err = classify_auth_error("User already registered");
        assert_eq!(err.auth_failure(), Some(AuthFailure::AccountExists));

        let err = classify_auth_error("duplicate key value violates unique constraint");
        assert_eq!(err.auth_failure(), Some(AuthFailure::AccountExists));

        let err = classify_auth_error("Email not confirmed");
        assert_eq!(err.auth_failure(), Some(AuthFailure::EmailUnconfirmed));

        let err = classify_auth_error("something unexpected");
        assert_eq!(err.auth_failure(), Some(AuthFailure::Other));
        assert_eq!(err.to_string(), "Authentication failed");
    }

    #[test]
    fn test_wisdom_row_decodes() {
        let mut row = create_test_row("wisdom");
        row.content = Some("shared knowledge".to_string());
        let post = Post::try_from(row).unwrap();
        assert_eq!(post.post_type(), PostType::Wisdom);
    }

    #[test]
    fn test_partial_donation_row_rejected() {
        let mut row = create_test_row("donation");
        row.resource_title = Some("Laptop".to_string());
        // Category and contact missing: the row is malformed and must not
        // surface as a half-empty donation.
        assert!(Post::try_from(row).is_err());
    }

    #[test]
    fn test_unknown_category_row_rejected() {
        let mut row = create_test_row("donation");
        row.resource_title = Some("Laptop".to_string());
        row.resource_category = Some("vehicles".to_string());
        row.resource_contact = Some("a@b.com".to_string());
        assert!(Post::try_from(row).is_err());
    }

    #[test]
    fn test_insert_encoding_skips_other_group() {
        let post = NewPost {
            user_id: "user-1".to_string(),
            body: PostBody::Wisdom {
                content: "hello".to_string(),
            },
        };
        let json = serde_json::to_value(PostInsert::new(&post)).unwrap();
        assert_eq!(json["post_type"], "wisdom");
        assert_eq!(json["content"], "hello");
        assert!(json.get("resource_title").is_none());
        assert!(json.get("resource_contact").is_none());
    }

    #[test]
    fn test_digest_changes_with_collection() {
        let before = digest_ids(["a", "b"].into_iter());
        let after = digest_ids(["c", "a", "b"].into_iter());
        assert_ne!(before, after);
        assert_eq!(before, digest_ids(["a", "b"].into_iter()));
    }
}
