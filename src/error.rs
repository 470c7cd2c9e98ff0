//! Error types for SikshaSetu operations.

use thiserror::Error;

use crate::permissions::Denial;

/// Result type alias for SikshaSetu operations.
pub type Result<T> = std::result::Result<T, SetuError>;

/// How an authentication attempt failed.
///
/// The variants drive caller behavior (e.g. switching the form to sign-in
/// mode on `AccountExists`); the user-facing text lives in the paired
/// [`SetuError::Auth`] message and comes from a fixed allow-list, never raw
/// collaborator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Email/password pair rejected.
    InvalidCredentials,
    /// Registration with an email that already has an account.
    AccountExists,
    /// Account exists but the email address was never confirmed.
    EmailUnconfirmed,
    /// Anything else the collaborator reported.
    Other,
}

/// Main error type for SikshaSetu operations.
#[derive(Error, Debug)]
pub enum SetuError {
    /// Local input validation failure. Never reaches the storage
    /// collaborator; form state is preserved so the user can resubmit.
    #[error("{0}")]
    Validation(String),

    /// Authentication failure, already mapped to a user-facing message.
    #[error("{message}")]
    Auth { kind: AuthFailure, message: String },

    /// An action attempted without satisfying its permission predicate.
    /// Always caught before the storage call is made.
    #[error("{0}")]
    Permission(Denial),

    /// The backend collaborator is not configured or not reachable.
    #[error("Backend not configured. Connect the application to its backend to enable community features.")]
    BackendUnavailable,

    /// Transient failure on a create/update/delete/upload against the
    /// storage collaborator. Not retried automatically.
    #[error("Storage operation failed: {0}")]
    Storage(String),

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl SetuError {
    /// Creates a new validation error.
    pub fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Creates a new authentication error.
    pub fn auth<T: ToString>(kind: AuthFailure, msg: T) -> Self {
        Self::Auth {
            kind,
            message: msg.to_string(),
        }
    }

    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Returns true when this error is resolved locally (validation and
    /// permission denials) and must not be logged as an incident.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Permission(_))
    }

    /// Returns the auth failure kind, if this is an auth error.
    pub fn auth_failure(&self) -> Option<AuthFailure> {
        match self {
            Self::Auth { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<Denial> for SetuError {
    fn from(denial: Denial) -> Self {
        Self::Permission(denial)
    }
}
