//! Permission evaluation for viewer actions.
//!
//! This module is the sole gate on information disclosure (donor contact
//! details) and resource contention (claiming), so it is deliberately small,
//! pure, and heavily tested. The rules:
//!
//! - **Posting**: any signed-in donor, or a signed-in verified student.
//! - **Claiming a resource / seeing contact info**: signed-in verified
//!   students only. The two are gated identically.
//! - **Editing or deleting a post**: the post's owner only; role and
//!   verification status are irrelevant.
//!
//! Each `check_*` function returns the viewer's profile on success so
//! callers don't re-unwrap the option, or a single [`Denial`] chosen by
//! priority: sign-in required, then role mismatch, then verification
//! required. Only one reason is ever surfaced at a time.

use std::fmt;

use crate::post::Post;
use crate::profile::{Role, UserProfile};

/// The single user-facing reason an action was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// No signed-in user.
    SignInRequired,
    /// The action is reserved for students.
    StudentsOnly,
    /// The viewer's role matches but they are not verified.
    VerificationRequired,
    /// The viewer does not own the targeted post.
    NotOwner,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Denial::SignInRequired => "Please sign in to continue",
            Denial::StudentsOnly => "Only students can claim resources",
            Denial::VerificationRequired => {
                "You need to be a verified student to use this feature"
            }
            Denial::NotOwner => "Only the author can change this post",
        };
        f.write_str(message)
    }
}

/// Checks whether the viewer may publish a post.
///
/// True for donors and for verified students.
pub fn check_post(viewer: Option<&UserProfile>) -> Result<&UserProfile, Denial> {
    let profile = viewer.ok_or(Denial::SignInRequired)?;
    match profile.role {
        Role::Donor => Ok(profile),
        Role::Student if profile.is_verified() => Ok(profile),
        Role::Student => Err(Denial::VerificationRequired),
    }
}

/// Checks whether the viewer may claim a donated resource.
pub fn check_claim_resource(viewer: Option<&UserProfile>) -> Result<&UserProfile, Denial> {
    let profile = viewer.ok_or(Denial::SignInRequired)?;
    if profile.role != Role::Student {
        return Err(Denial::StudentsOnly);
    }
    if !profile.is_verified() {
        return Err(Denial::VerificationRequired);
    }
    Ok(profile)
}

/// Checks whether the viewer may see donor contact information.
///
/// Contact details are gated identically to claiming.
pub fn check_see_contact_info(viewer: Option<&UserProfile>) -> Result<&UserProfile, Denial> {
    check_claim_resource(viewer)
}

/// Checks whether the viewer may edit or delete the given post.
///
/// A sole-ownership check: role and verification status play no part.
pub fn check_edit_or_delete<'a>(
    viewer: Option<&'a UserProfile>,
    post: &Post,
) -> Result<&'a UserProfile, Denial> {
    let profile = viewer.ok_or(Denial::SignInRequired)?;
    if profile.id == post.user_id {
        Ok(profile)
    } else {
        Err(Denial::NotOwner)
    }
}

pub fn can_post(viewer: Option<&UserProfile>) -> bool {
    check_post(viewer).is_ok()
}

pub fn can_claim_resource(viewer: Option<&UserProfile>) -> bool {
    check_claim_resource(viewer).is_ok()
}

pub fn can_see_contact_info(viewer: Option<&UserProfile>) -> bool {
    check_see_contact_info(viewer).is_ok()
}

pub fn can_edit_or_delete(viewer: Option<&UserProfile>, post: &Post) -> bool {
    check_edit_or_delete(viewer, post).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::PostBody;
    use crate::profile::VerificationStatus;
    use chrono::Utc;

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

    fn create_test_post(owner: &str) -> Post {
        Post {
            id: "post-1".to_string(),
            user_id: owner.to_string(),
            body: PostBody::Wisdom {
                content: "content".to_string(),
            },
            author: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_anonymous_viewer_denied_everything() {
        let post = create_test_post("someone");
        assert_eq!(check_post(None).unwrap_err(), Denial::SignInRequired);
        assert_eq!(
            check_claim_resource(None).unwrap_err(),
            Denial::SignInRequired
        );
        assert_eq!(
            check_see_contact_info(None).unwrap_err(),
            Denial::SignInRequired
        );
        assert_eq!(
            check_edit_or_delete(None, &post).unwrap_err(),
            Denial::SignInRequired
        );
    }

    #[test]
    fn test_donor_can_always_post() {
        // Donors pass canPost unconditionally; their status is Verified by
        // construction, but the rule must not depend on it.
        let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);
        assert!(can_post(Some(&donor)));
    }

    #[test]
    fn test_donor_cannot_claim_or_see_contact() {
        let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);
        assert_eq!(
            check_claim_resource(Some(&donor)).unwrap_err(),
            Denial::StudentsOnly
        );
        assert_eq!(
            check_see_contact_info(Some(&donor)).unwrap_err(),
            Denial::StudentsOnly
        );
    }

    #[test]
    fn test_unverified_student_denied_with_verification_reason() {
        for status in [VerificationStatus::Unverified, VerificationStatus::Pending] {
            let student = create_test_profile("s", Role::Student, status);
            assert_eq!(
                check_post(Some(&student)).unwrap_err(),
                Denial::VerificationRequired
            );
            assert_eq!(
                check_claim_resource(Some(&student)).unwrap_err(),
                Denial::VerificationRequired
            );
            assert!(!can_see_contact_info(Some(&student)));
        }
    }

    #[test]
    fn test_verified_student_allowed() {
        let student = create_test_profile("s", Role::Student, VerificationStatus::Verified);
        assert!(can_post(Some(&student)));
        assert!(can_claim_resource(Some(&student)));
        assert!(can_see_contact_info(Some(&student)));
    }

    #[test]
    fn test_ownership_check_ignores_role_and_verification() {
        let post = create_test_post("owner");

        let owner = create_test_profile("owner", Role::Student, VerificationStatus::Unverified);
        assert!(can_edit_or_delete(Some(&owner), &post));

        let verified_donor = create_test_profile("other", Role::Donor, VerificationStatus::Verified);
        assert_eq!(
            check_edit_or_delete(Some(&verified_donor), &post).unwrap_err(),
            Denial::NotOwner
        );
    }

    #[test]
    fn test_denial_priority_is_sign_in_first() {
        // A missing user always wins over any role or verification reason.
        assert_eq!(check_claim_resource(None).unwrap_err(), Denial::SignInRequired);
    }

    #[test]
    fn test_denial_messages_are_single_and_stable() {
        assert_eq!(
            Denial::SignInRequired.to_string(),
            "Please sign in to continue"
        );
        assert_eq!(
            Denial::StudentsOnly.to_string(),
            "Only students can claim resources"
        );
        assert_eq!(
            Denial::VerificationRequired.to_string(),
            "You need to be a verified student to use this feature"
        );
        assert_eq!(
            Denial::NotOwner.to_string(),
            "Only the author can change this post"
        );
    }
}
