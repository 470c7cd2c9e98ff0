//! User profiles, roles, and verification status.
//!
//! A profile is created exactly once at sign-up, paired 1:1 with an identity
//! record. The role is immutable for the lifetime of the account; the
//! verification status only moves `Unverified -> Pending` (document
//! submitted) and `Pending -> Verified` (external review, out of scope
//! here). Donors are verified at creation and never transition.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SetuError};

/// Account role, chosen at registration and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Donor,
}

impl Role {
    /// The verification status a fresh profile of this role starts with.
    ///
    /// Donors are auto-verified; students must go through the verification
    /// flow before gaining posting/claiming privileges.
    pub fn initial_verification_status(self) -> VerificationStatus {
        match self {
            Role::Donor => VerificationStatus::Verified,
            Role::Student => VerificationStatus::Unverified,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Donor => "donor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SetuError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "student" => Ok(Role::Student),
            "donor" => Ok(Role::Donor),
            other => Err(SetuError::validation(format!("Unknown role: {other}"))),
        }
    }
}

/// Tri-state trust flag gating content visibility and posting rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Unverified,
    Pending,
    Verified,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user profile record, as stored by the profile collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Opaque identifier, shared with the identity record.
    pub id: String,
    pub email: String,
    /// Display name, derived from the email local-part at creation.
    pub username: String,
    pub role: Role,
    pub verification_status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }

    /// Uppercase first character of the username, for avatar fallbacks.
    pub fn initial(&self) -> char {
        self.username
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('U')
    }
}

/// Derives the display username from an email address (local-part).
pub fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

/// A profile to be created, before the collaborator assigns `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub verification_status: VerificationStatus,
}

impl NewProfile {
    /// Builds the profile record for a fresh registration: username derived
    /// from the email, verification status derived from the role.
    pub fn for_registration(id: String, email: &str, role: Role) -> Self {
        Self {
            id,
            email: email.to_string(),
            username: username_from_email(email),
            role,
            verification_status: role.initial_verification_status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_donor_starts_verified() {
        let profile = NewProfile::for_registration(
            "user-1".to_string(),
            "mentor@example.com",
            Role::Donor,
        );
        assert_eq!(profile.verification_status, VerificationStatus::Verified);
    }

    #[test]
    fn test_student_starts_unverified() {
        let profile = NewProfile::for_registration(
            "user-2".to_string(),
            "learner@example.com",
            Role::Student,
        );
        assert_eq!(profile.verification_status, VerificationStatus::Unverified);
    }

    #[test]
    fn test_username_from_email() {
        assert_eq!(username_from_email("asha@example.com"), "asha");
        assert_eq!(username_from_email("no-at-sign"), "no-at-sign");
        assert_eq!(username_from_email("a@b@c"), "a");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("student".parse::<Role>().unwrap(), Role::Student);
        assert_eq!("donor".parse::<Role>().unwrap(), Role::Donor);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Role::Donor).unwrap();
        assert_eq!(json, "\"donor\"");
        let status: VerificationStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, VerificationStatus::Pending);
    }
}
