//! Askama templates and display structs for the SikshaSetu web interface.

use askama::Template;
use sikshasetu::lifecycle::PostView;
use sikshasetu::post::{PostType, ResourceCategory};
use sikshasetu::profile::{Role, UserProfile, VerificationStatus};

/// Profile information prepared for display.
#[derive(Debug, Clone)]
pub struct ProfileInfo {
    pub username: String,
    pub email: String,
    pub role_label: &'static str,
    pub is_donor: bool,
    pub status_label: &'static str,
    pub is_verified: bool,
    pub is_pending: bool,
    pub joined: String,
    pub bio: String,
    pub organization: String,
}

impl ProfileInfo {
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            username: profile.username.clone(),
            email: profile.email.clone(),
            role_label: match profile.role {
                Role::Donor => "Donor",
                Role::Student => "Student",
            },
            is_donor: profile.role == Role::Donor,
            status_label: match profile.verification_status {
                VerificationStatus::Unverified => "Unverified",
                VerificationStatus::Pending => "Verification pending",
                VerificationStatus::Verified => "Verified",
            },
            is_verified: profile.verification_status == VerificationStatus::Verified,
            is_pending: profile.verification_status == VerificationStatus::Pending,
            joined: profile.created_at.format("%b %e, %Y").to_string(),
            bio: profile.bio.clone().unwrap_or_default(),
            organization: profile.organization.clone().unwrap_or_default(),
        }
    }
}

/// A post card prepared for display.
#[derive(Debug, Clone)]
pub struct PostCard {
    pub id: String,
    pub author_username: String,
    pub author_is_donor: bool,
    pub author_verified: bool,
    pub is_wisdom: bool,
    pub type_label: &'static str,
    pub posted_at: String,
    pub content: String,
    pub resource_title: String,
    pub resource_category: String,
    pub resource_contact: String,
    pub contact_redacted: bool,
    pub can_edit: bool,
    pub can_claim: bool,
    pub claim_hint: String,
}

impl PostCard {
    pub fn from_view(view: &PostView) -> Self {
        Self {
            id: view.id.clone(),
            author_username: view.author_username.clone(),
            author_is_donor: view.author_role == Some(Role::Donor),
            author_verified: view.author_verified,
            is_wisdom: view.post_type == PostType::Wisdom,
            type_label: match view.post_type {
                PostType::Wisdom => "Wisdom",
                PostType::Donation => "Resource",
            },
            posted_at: view.created_at.format("%b %e, %Y %H:%M UTC").to_string(),
            content: view.content.clone().unwrap_or_default(),
            resource_title: view.resource_title.clone().unwrap_or_default(),
            resource_category: view.resource_category.unwrap_or_default().to_string(),
            resource_contact: view.resource_contact.clone().unwrap_or_default(),
            contact_redacted: view.contact_redacted,
            can_edit: view.can_edit,
            can_claim: view.can_claim,
            claim_hint: view
                .claim_denial
                .map(|denial| denial.to_string())
                .unwrap_or_default(),
        }
    }
}

/// One entry of the donation category select.
#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// All donation categories, in display order.
pub fn category_options() -> Vec<CategoryOption> {
    ResourceCategory::ALL
        .iter()
        .map(|category| CategoryOption {
            value: category.as_str(),
            label: category.label(),
        })
        .collect()
}

/// Community feed with the composer and auth card.
#[derive(Template)]
#[template(path = "feed.html")]
pub struct FeedTemplate {
    pub active_page: String,
    pub flash: Option<String>,
    pub flash_error: Option<String>,
    pub backend_available: bool,
    pub signed_in: bool,
    pub profile: Option<ProfileInfo>,
    pub profile_missing: bool,
    pub auth_mode: String,
    pub can_post: bool,
    pub posting_hint: String,
    pub posts: Vec<PostCard>,
    pub categories: Vec<CategoryOption>,
    /// Preserved composer input from a failed submission.
    pub draft: crate::handlers::ComposerForm,
    pub csrf_token: String,
}

/// Profile page.
#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub active_page: String,
    pub flash: Option<String>,
    pub flash_error: Option<String>,
    pub backend_available: bool,
    pub signed_in: bool,
    pub profile: Option<ProfileInfo>,
    pub profile_missing: bool,
    pub csrf_token: String,
}

/// Static privacy policy page. Renders regardless of backend state.
#[derive(Template)]
#[template(path = "privacy.html")]
pub struct PrivacyTemplate {
    pub active_page: String,
    pub flash: Option<String>,
    pub flash_error: Option<String>,
}

/// Student verification page.
#[derive(Template)]
#[template(path = "verification.html")]
pub struct VerificationTemplate {
    pub active_page: String,
    pub flash: Option<String>,
    pub flash_error: Option<String>,
    pub backend_available: bool,
    pub signed_in: bool,
    pub is_donor: bool,
    pub is_verified: bool,
    pub is_pending: bool,
    pub csrf_token: String,
}

/// Edit form for an owned post.
#[derive(Template)]
#[template(path = "edit_post.html")]
pub struct EditPostTemplate {
    pub active_page: String,
    pub flash: Option<String>,
    pub flash_error: Option<String>,
    pub post_id: String,
    pub is_wisdom: bool,
    pub content: String,
    pub resource_title: String,
    pub resource_category: String,
    pub resource_contact: String,
    pub categories: Vec<CategoryOption>,
    pub csrf_token: String,
}

/// Explicit confirmation step before the irreversible delete.
#[derive(Template)]
#[template(path = "confirm_delete.html")]
pub struct ConfirmDeleteTemplate {
    pub active_page: String,
    pub flash: Option<String>,
    pub flash_error: Option<String>,
    pub post_id: String,
    pub summary: String,
    pub csrf_token: String,
}
