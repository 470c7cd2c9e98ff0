//! Student identity verification.
//!
//! A student uploads a photo of their student ID; the document lands in the
//! verification bucket and the profile moves `Unverified -> Pending`. The
//! review that moves `Pending -> Verified` happens outside this system.
//! File constraints (image MIME type, 5 MB ceiling) are enforced here,
//! before any bytes leave the process.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::backend::{DocumentStore, ProfileStore};
use crate::error::{Result, SetuError};
use crate::profile::{Role, UserProfile, VerificationStatus};

/// Upper bound on verification document size.
pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// A document selected for upload.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub file_name: String,
    /// MIME type as reported by the client.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    /// Validates the client-side constraints: image MIME type, non-empty
    /// content, and the size ceiling. Violations never reach the
    /// collaborator.
    pub fn validate(&self) -> Result<()> {
        if self.file_name.trim().is_empty() || self.bytes.is_empty() {
            return Err(SetuError::validation("Please select a file to upload"));
        }
        if !self.content_type.starts_with("image/") {
            return Err(SetuError::validation("Please select an image file"));
        }
        if self.bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(SetuError::validation("File size must be less than 5MB"));
        }
        Ok(())
    }
}

/// Drives the verification submission flow.
pub struct VerificationService {
    profiles: Arc<dyn ProfileStore>,
    documents: Arc<dyn DocumentStore>,
}

impl VerificationService {
    pub fn new(profiles: Arc<dyn ProfileStore>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            profiles,
            documents,
        }
    }

    /// Submits a verification document for the given profile.
    ///
    /// Donors never need verification; students with a submission already
    /// under review (or already verified) are rejected, so at most one
    /// submission is in flight per account. On success the profile's
    /// status transitions `Unverified -> Pending`.
    #[instrument(skip(self, profile, document), fields(user_id = %profile.id))]
    pub async fn submit(&self, profile: &UserProfile, document: UploadedDocument) -> Result<()> {
        document.validate()?;

        if profile.role == Role::Donor {
            return Err(SetuError::validation(
                "Verification is not required for donor accounts",
            ));
        }
        match profile.verification_status {
            VerificationStatus::Verified => {
                return Err(SetuError::validation("Your account is already verified"));
            }
            VerificationStatus::Pending => {
                return Err(SetuError::validation(
                    "Your verification is already under review",
                ));
            }
            VerificationStatus::Unverified => {}
        }

        self.documents.upload(&profile.id, document).await?;
        self.profiles
            .set_verification_status(&profile.id, VerificationStatus::Pending)
            .await?;

        info!("Verification document submitted, status now pending");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_document() -> UploadedDocument {
        UploadedDocument {
            file_name: "student-id.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![0u8; 1024],
        }
    }

    #[test]
    fn test_valid_image_accepted() {
        assert!(create_test_document().validate().is_ok());
    }

    #[test]
    fn test_non_image_rejected() {
        let mut document = create_test_document();
        document.content_type = "application/pdf".to_string();
        assert!(document.validate().is_err());
    }

    #[test]
    fn test_oversized_file_rejected() {
        let mut document = create_test_document();
        document.bytes = vec![0u8; MAX_DOCUMENT_BYTES + 1];
        assert!(document.validate().is_err());
    }

    #[test]
    fn test_empty_selection_rejected() {
        let mut document = create_test_document();
        document.bytes.clear();
        assert!(document.validate().is_err());
    }
}
