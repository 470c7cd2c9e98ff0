//! Post lifecycle: creation, editing, deletion, listing, and rendering.
//!
//! Per post the states are DRAFT (client-side only) -> PUBLISHED ->
//! EDITED -> DELETED (terminal). Every transition validates locally first,
//! then checks the permission predicate, and only then touches the storage
//! collaborator — a denial never produces a storage call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::backend::PostStore;
use crate::error::{Result, SetuError};
use crate::permissions::{self, Denial};
use crate::post::{sort_feed, NewPost, Post, PostBody, PostDraft, PostType};
use crate::profile::{Role, UserProfile};

/// Placeholder shown in place of contact details to non-entitled viewers.
pub const CONTACT_REDACTED: &str = "Verification required to view";

/// Governs post transitions against the permission evaluator.
pub struct PostManager {
    store: Arc<dyn PostStore>,
}

impl PostManager {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    /// Publishes a new post: DRAFT -> PUBLISHED.
    ///
    /// Validation failures and permission denials are local; on storage
    /// failure the caller keeps the draft so the user can resubmit.
    #[instrument(skip(self, viewer, draft))]
    pub async fn create(&self, viewer: Option<&UserProfile>, draft: &PostDraft) -> Result<Post> {
        let body = draft.validate()?;
        let profile = permissions::check_post(viewer)?;

        let post = self
            .store
            .create_post(NewPost {
                user_id: profile.id.clone(),
                body,
            })
            .await?;
        info!("Published {} post {}", post.post_type(), post.id);
        Ok(post)
    }

    /// Replaces the variant field group of an owned post: -> EDITED.
    ///
    /// The post type is immutable; a draft of the other type is rejected
    /// before any storage call.
    #[instrument(skip(self, viewer, draft))]
    pub async fn edit(
        &self,
        viewer: Option<&UserProfile>,
        post_id: &str,
        draft: &PostDraft,
    ) -> Result<()> {
        let body = draft.validate()?;
        let existing = self
            .store
            .get_post(post_id)
            .await?
            .ok_or(SetuError::NotFound("Post"))?;
        permissions::check_edit_or_delete(viewer, &existing)?;

        if body.post_type() != existing.post_type() {
            return Err(SetuError::validation("A post's type cannot be changed"));
        }

        self.store.update_post(post_id, body).await?;
        info!("Edited post {post_id}");
        Ok(())
    }

    /// Removes an owned post: -> DELETED (terminal, no undo).
    ///
    /// `confirmed` carries the caller's explicit confirmation step; the
    /// irreversible transition never happens without it.
    #[instrument(skip(self, viewer))]
    pub async fn delete(
        &self,
        viewer: Option<&UserProfile>,
        post_id: &str,
        confirmed: bool,
    ) -> Result<()> {
        if !confirmed {
            return Err(SetuError::validation("Deletion requires confirmation"));
        }
        let existing = self
            .store
            .get_post(post_id)
            .await?
            .ok_or(SetuError::NotFound("Post"))?;
        permissions::check_edit_or_delete(viewer, &existing)?;

        self.store.delete_post(post_id).await?;
        info!("Deleted post {post_id}");
        Ok(())
    }

    /// The full feed, newest first with a deterministic tiebreak. Visible
    /// to every viewer; redaction happens at render time, not here.
    pub async fn list(&self) -> Result<Vec<Post>> {
        let mut posts = self.store.list_posts().await?;
        sort_feed(&mut posts);
        Ok(posts)
    }
}

/// A post prepared for display to a specific viewer.
///
/// This is the redaction boundary: the underlying record may carry the
/// donor's contact details, but a view built for a viewer failing the
/// contact-info predicate carries only the placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct PostView {
    pub id: String,
    pub post_type: PostType,
    pub author_username: String,
    pub author_role: Option<Role>,
    pub author_verified: bool,
    pub created_at: DateTime<Utc>,
    /// Wisdom content; `None` for donations.
    pub content: Option<String>,
    /// Donation fields; `None` for wisdom posts.
    pub resource_title: Option<String>,
    pub resource_category: Option<&'static str>,
    pub resource_contact: Option<String>,
    pub contact_redacted: bool,
    /// Viewer-specific affordances.
    pub can_edit: bool,
    pub can_claim: bool,
    /// The single reason claiming is unavailable, when it is.
    pub claim_denial: Option<Denial>,
}

/// Builds the display view of a post for the given viewer.
pub fn render(post: &Post, viewer: Option<&UserProfile>) -> PostView {
    let (author_username, author_role, author_verified) = match &post.author {
        Some(author) => (
            author.username.clone(),
            Some(author.role),
            author.role == Role::Donor || author.is_verified(),
        ),
        None => ("Unknown User".to_string(), None, false),
    };

    let can_see_contact = permissions::can_see_contact_info(viewer);
    let claim_denial = permissions::check_claim_resource(viewer).err();

    let (content, resource_title, resource_category, resource_contact, contact_redacted) =
        match &post.body {
            PostBody::Wisdom { content } => (Some(content.clone()), None, None, None, false),
            PostBody::Donation {
                resource_title,
                resource_category,
                resource_contact,
            } => {
                let (contact, redacted) = if can_see_contact {
                    (resource_contact.clone(), false)
                } else {
                    (CONTACT_REDACTED.to_string(), true)
                };
                (
                    None,
                    Some(resource_title.clone()),
                    Some(resource_category.label()),
                    Some(contact),
                    redacted,
                )
            }
        };

    PostView {
        id: post.id.clone(),
        post_type: post.post_type(),
        author_username,
        author_role,
        author_verified,
        created_at: post.created_at,
        content,
        resource_title,
        resource_category,
        resource_contact,
        contact_redacted,
        can_edit: permissions::can_edit_or_delete(viewer, post),
        can_claim: claim_denial.is_none(),
        claim_denial,
    }
}

/// Renders a whole feed for one viewer.
pub fn render_feed(posts: &[Post], viewer: Option<&UserProfile>) -> Vec<PostView> {
    posts.iter().map(|post| render(post, viewer)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::profile::VerificationStatus;

    fn create_test_profile(id: &str, role: Role, status: VerificationStatus) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            username: id.to_string(),
            role,
            verification_status: status,
            bio: None,
            organization: None,
            created_at: Utc::now(),
        }
    }

    fn manager() -> (Arc<MemoryBackend>, PostManager) {
        let backend = Arc::new(MemoryBackend::new());
        let manager = PostManager::new(backend.clone());
        (backend, manager)
    }

    #[tokio::test]
    async fn test_unverified_student_denied_before_storage() {
        let (_, manager) = manager();
        let student = create_test_profile("s", Role::Student, VerificationStatus::Unverified);

        let err = manager
            .create(Some(&student), &PostDraft::wisdom("hello"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SetuError::Permission(Denial::VerificationRequired)
        ));
        assert!(manager.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_never_reaches_store() {
        let (_, manager) = manager();
        let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);

        let err = manager
            .create(Some(&donor), &PostDraft::wisdom("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, SetuError::Validation(_)));
        assert!(manager.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_donor_publishes_donation() {
        let (_, manager) = manager();
        let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);

        let post = manager
            .create(
                Some(&donor),
                &PostDraft::donation("Programming Books", "books", "donor@example.com"),
            )
            .await
            .unwrap();
        assert_eq!(post.post_type(), PostType::Donation);
        assert_eq!(manager.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_owner_edit_replaces_variant_fields() {
        let (_, manager) = manager();
        let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);

        let post = manager
            .create(Some(&donor), &PostDraft::wisdom("A"))
            .await
            .unwrap();
        manager
            .edit(Some(&donor), &post.id, &PostDraft::wisdom("B"))
            .await
            .unwrap();

        let listed = manager.list().await.unwrap();
        assert_eq!(
            listed[0].body,
            PostBody::Wisdom {
                content: "B".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_non_owner_edit_rejected_before_storage() {
        let (_, manager) = manager();
        let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);
        let other = create_test_profile("x", Role::Donor, VerificationStatus::Verified);

        let post = manager
            .create(Some(&donor), &PostDraft::wisdom("A"))
            .await
            .unwrap();
        let err = manager
            .edit(Some(&other), &post.id, &PostDraft::wisdom("B"))
            .await
            .unwrap_err();
        assert!(matches!(err, SetuError::Permission(Denial::NotOwner)));

        let listed = manager.list().await.unwrap();
        assert_eq!(
            listed[0].body,
            PostBody::Wisdom {
                content: "A".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_edit_cannot_change_post_type() {
        let (_, manager) = manager();
        let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);

        let post = manager
            .create(Some(&donor), &PostDraft::wisdom("A"))
            .await
            .unwrap();
        let err = manager
            .edit(
                Some(&donor),
                &post.id,
                &PostDraft::donation("Books", "books", "a@b.com"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SetuError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let (_, manager) = manager();
        let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);

        let post = manager
            .create(Some(&donor), &PostDraft::wisdom("A"))
            .await
            .unwrap();

        assert!(manager.delete(Some(&donor), &post.id, false).await.is_err());
        assert_eq!(manager.list().await.unwrap().len(), 1);

        manager.delete(Some(&donor), &post.id, true).await.unwrap();
        assert!(manager.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_owner_only() {
        let (_, manager) = manager();
        let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);
        let other = create_test_profile("x", Role::Student, VerificationStatus::Verified);

        let post = manager
            .create(Some(&donor), &PostDraft::wisdom("A"))
            .await
            .unwrap();
        let err = manager
            .delete(Some(&other), &post.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, SetuError::Permission(Denial::NotOwner)));
    }

    #[test]
    fn test_contact_redacted_for_non_entitled_viewers() {
        let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);
        let post = Post {
            id: "p1".to_string(),
            user_id: donor.id.clone(),
            body: PostBody::Donation {
                resource_title: "Laptop".to_string(),
                resource_category: "electronics".parse().unwrap(),
                resource_contact: "donor@example.com".to_string(),
            },
            author: Some(donor.clone()),
            created_at: Utc::now(),
        };

        // Anonymous viewer: redacted, no claim.
        let view = render(&post, None);
        assert!(view.contact_redacted);
        assert_eq!(view.resource_contact.as_deref(), Some(CONTACT_REDACTED));
        assert!(!view.can_claim);
        assert_eq!(view.claim_denial, Some(Denial::SignInRequired));

        // The donor owner: can edit, but contact is still redacted.
        let view = render(&post, Some(&donor));
        assert!(view.can_edit);
        assert!(view.contact_redacted);
        assert_eq!(view.claim_denial, Some(Denial::StudentsOnly));

        // Verified student: full contact, claimable.
        let student = create_test_profile("s", Role::Student, VerificationStatus::Verified);
        let view = render(&post, Some(&student));
        assert!(!view.contact_redacted);
        assert_eq!(view.resource_contact.as_deref(), Some("donor@example.com"));
        assert!(view.can_claim);
        assert!(view.claim_denial.is_none());
    }

    #[test]
    fn test_wisdom_view_carries_no_donation_fields() {
        let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);
        let post = Post {
            id: "p1".to_string(),
            user_id: donor.id.clone(),
            body: PostBody::Wisdom {
                content: "knowledge".to_string(),
            },
            author: Some(donor),
            created_at: Utc::now(),
        };

        let view = render(&post, None);
        assert_eq!(view.content.as_deref(), Some("knowledge"));
        assert!(view.resource_title.is_none());
        assert!(view.resource_contact.is_none());
        assert!(!view.contact_redacted);
    }
}
