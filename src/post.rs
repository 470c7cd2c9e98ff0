//! Posts: free-text wisdom entries and structured resource donations.
//!
//! The two variants carry disjoint field groups; [`PostBody`] makes partial
//! states (a donation missing its category, say) unrepresentable in the
//! domain model. Adapter row types enforce the same invariant at decode
//! time, so a malformed record is rejected rather than surfaced half-empty.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SetuError};
use crate::profile::UserProfile;

/// Discriminates the two post variants. Set once at creation, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Wisdom,
    Donation,
}

impl PostType {
    pub fn as_str(self) -> &'static str {
        match self {
            PostType::Wisdom => "wisdom",
            PostType::Donation => "donation",
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostType {
    type Err = SetuError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "wisdom" => Ok(PostType::Wisdom),
            "donation" => Ok(PostType::Donation),
            other => Err(SetuError::validation(format!("Unknown post type: {other}"))),
        }
    }
}

/// Fixed category set for donated resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Books,
    Stationery,
    Electronics,
    Courses,
    Mentorship,
    Scholarships,
    Internships,
    Software,
    Other,
}

impl ResourceCategory {
    /// All categories, in display order.
    pub const ALL: [ResourceCategory; 9] = [
        ResourceCategory::Books,
        ResourceCategory::Stationery,
        ResourceCategory::Electronics,
        ResourceCategory::Courses,
        ResourceCategory::Mentorship,
        ResourceCategory::Scholarships,
        ResourceCategory::Internships,
        ResourceCategory::Software,
        ResourceCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceCategory::Books => "books",
            ResourceCategory::Stationery => "stationery",
            ResourceCategory::Electronics => "electronics",
            ResourceCategory::Courses => "courses",
            ResourceCategory::Mentorship => "mentorship",
            ResourceCategory::Scholarships => "scholarships",
            ResourceCategory::Internships => "internships",
            ResourceCategory::Software => "software",
            ResourceCategory::Other => "other",
        }
    }

    /// Human-readable label for selects and post rendering.
    pub fn label(self) -> &'static str {
        match self {
            ResourceCategory::Books => "Books & Study Materials",
            ResourceCategory::Stationery => "Stationery & Supplies",
            ResourceCategory::Electronics => "Electronics & Gadgets",
            ResourceCategory::Courses => "Online Courses & Subscriptions",
            ResourceCategory::Mentorship => "Mentorship & Guidance",
            ResourceCategory::Scholarships => "Scholarships & Financial Aid",
            ResourceCategory::Internships => "Internship Opportunities",
            ResourceCategory::Software => "Software & Tools",
            ResourceCategory::Other => "Other Resources",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceCategory {
    type Err = SetuError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| SetuError::validation(format!("Unknown donation category: {s}")))
    }
}

/// The variant field group of a post. Exactly one group is populated.
#[derive(Debug, Clone, PartialEq)]
pub enum PostBody {
    Wisdom {
        content: String,
    },
    Donation {
        resource_title: String,
        resource_category: ResourceCategory,
        resource_contact: String,
    },
}

impl PostBody {
    pub fn post_type(&self) -> PostType {
        match self {
            PostBody::Wisdom { .. } => PostType::Wisdom,
            PostBody::Donation { .. } => PostType::Donation,
        }
    }
}

/// A published post with its read-only author join.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Opaque identifier assigned by the storage collaborator at creation.
    pub id: String,
    /// Owning profile id. Ownership is permanent.
    pub user_id: String,
    pub body: PostBody,
    /// Author profile, resolved by the storage collaborator for display.
    pub author: Option<UserProfile>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn post_type(&self) -> PostType {
        self.body.post_type()
    }
}

/// A validated post ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub user_id: String,
    pub body: PostBody,
}

/// Raw composer input, before validation.
///
/// Mirrors the form: the wisdom textarea and the three donation fields are
/// all carried; [`PostDraft::validate`] picks the group named by
/// `post_type` and ignores the other.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub post_type: String,
    pub content: String,
    pub resource_title: String,
    pub resource_category: String,
    pub resource_contact: String,
}

impl PostDraft {
    pub fn wisdom(content: impl Into<String>) -> Self {
        Self {
            post_type: PostType::Wisdom.as_str().to_string(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn donation(
        title: impl Into<String>,
        category: impl Into<String>,
        contact: impl Into<String>,
    ) -> Self {
        Self {
            post_type: PostType::Donation.as_str().to_string(),
            resource_title: title.into(),
            resource_category: category.into(),
            resource_contact: contact.into(),
            ..Self::default()
        }
    }

    /// Validates the draft into a [`PostBody`].
    ///
    /// Required fields must be non-empty after trimming and the donation
    /// category must belong to the fixed set. Failures are local
    /// [`SetuError::Validation`] values and never reach the collaborator.
    pub fn validate(&self) -> Result<PostBody> {
        match self.post_type.parse::<PostType>()? {
            PostType::Wisdom => {
                let content = self.content.trim();
                if content.is_empty() {
                    return Err(SetuError::validation("Please enter some wisdom to share"));
                }
                Ok(PostBody::Wisdom {
                    content: content.to_string(),
                })
            }
            PostType::Donation => {
                let title = self.resource_title.trim();
                let contact = self.resource_contact.trim();
                if title.is_empty() || self.resource_category.trim().is_empty() || contact.is_empty()
                {
                    return Err(SetuError::validation("Please fill in all donation details"));
                }
                let category = self.resource_category.trim().parse::<ResourceCategory>()?;
                Ok(PostBody::Donation {
                    resource_title: title.to_string(),
                    resource_category: category,
                    resource_contact: contact.to_string(),
                })
            }
        }
    }
}

/// Orders a feed: `created_at` descending, ties broken by `id` descending.
///
/// The secondary key keeps pagination and rendering deterministic across
/// refreshes when two posts share a timestamp.
pub fn sort_feed(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
