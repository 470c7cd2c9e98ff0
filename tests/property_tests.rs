//! Property-style tests for the permission table and feed ordering.
//!
//! The permission evaluator is the sole gate on contact-info disclosure
//! and claiming, so the whole (role x status x action) space is checked
//! exhaustively rather than by example.

use chrono::{TimeZone, Utc};
use sikshasetu::permissions::{
    can_claim_resource, can_edit_or_delete, can_post, can_see_contact_info, check_claim_resource,
    check_post, Denial,
};
use sikshasetu::post::{sort_feed, Post, PostBody};
use sikshasetu::profile::{NewProfile, Role, UserProfile, VerificationStatus};

const ROLES: [Role; 2] = [Role::Student, Role::Donor];
const STATUSES: [VerificationStatus; 3] = [
    VerificationStatus::Unverified,
    VerificationStatus::Pending,
    VerificationStatus::Verified,
];

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

fn create_test_post(owner: &str, id: &str, secs: i64) -> Post {
    Post {
        id: id.to_string(),
        user_id: owner.to_string(),
        body: PostBody::Wisdom {
            content: "content".to_string(),
        },
        author: None,
        created_at: Utc.timestamp_opt(secs, 0).unwrap(),
    }
}

#[test]
fn test_permission_table_is_exhaustive() {
    for role in ROLES {
        for status in STATUSES {
            let profile = create_test_profile("viewer", role, status);
            let viewer = Some(&profile);
            let verified = status == VerificationStatus::Verified;

            // canPost: donor OR verified.
            assert_eq!(
                can_post(viewer),
                role == Role::Donor || verified,
                "can_post failed for {role:?}/{status:?}"
            );

            // canClaimResource and canSeeContactInfo: verified student only,
            // and always identical to each other.
            let claim = role == Role::Student && verified;
            assert_eq!(can_claim_resource(viewer), claim);
            assert_eq!(can_see_contact_info(viewer), can_claim_resource(viewer));
        }
    }
}

#[test]
fn test_denial_reasons_follow_priority() {
    // Absent user always yields the sign-in reason.
    assert_eq!(check_post(None).unwrap_err(), Denial::SignInRequired);
    assert_eq!(
        check_claim_resource(None).unwrap_err(),
        Denial::SignInRequired
    );

    // Role mismatch outranks verification state: a donor is denied claiming
    // with the students-only reason even though donors are always verified.
    let donor = create_test_profile("d", Role::Donor, VerificationStatus::Verified);
    assert_eq!(
        check_claim_resource(Some(&donor)).unwrap_err(),
        Denial::StudentsOnly
    );

    // Matching role but unverified: the verification reason.
    for status in [VerificationStatus::Unverified, VerificationStatus::Pending] {
        let student = create_test_profile("s", Role::Student, status);
        assert_eq!(
            check_claim_resource(Some(&student)).unwrap_err(),
            Denial::VerificationRequired
        );
        assert_eq!(
            check_post(Some(&student)).unwrap_err(),
            Denial::VerificationRequired
        );
    }
}

#[test]
fn test_ownership_is_independent_of_role_and_verification() {
    let post = create_test_post("owner", "p1", 0);
    for role in ROLES {
        for status in STATUSES {
            let owner = create_test_profile("owner", role, status);
            assert!(can_edit_or_delete(Some(&owner), &post));

            let stranger = create_test_profile("stranger", role, status);
            assert!(!can_edit_or_delete(Some(&stranger), &post));
        }
    }
    assert!(!can_edit_or_delete(None, &post));
}

#[test]
fn test_registration_invariant_for_every_role() {
    for role in ROLES {
        let profile =
            NewProfile::for_registration("id".to_string(), "person@example.com", role);
        match role {
            Role::Donor => {
                assert_eq!(profile.verification_status, VerificationStatus::Verified)
            }
            Role::Student => assert_eq!(
                profile.verification_status,
                VerificationStatus::Unverified
            ),
        }
        assert_eq!(profile.username, "person");
    }
}

#[test]
fn test_feed_order_is_total_and_stable() {
    // Same multiset of posts in any insertion order sorts identically.
    let posts = vec![
        create_test_post("a", "p1", 100),
        create_test_post("a", "p2", 100),
        create_test_post("b", "p3", 50),
        create_test_post("b", "p4", 200),
        create_test_post("c", "p5", 100),
    ];

    let mut forward = posts.clone();
    sort_feed(&mut forward);

    let mut reversed: Vec<Post> = posts.into_iter().rev().collect();
    sort_feed(&mut reversed);

    assert_eq!(forward, reversed);

    // Newest first; equal timestamps fall back to descending id.
    let ids: Vec<&str> = forward.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["p4", "p5", "p2", "p1", "p3"]);
}
