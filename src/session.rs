//! Session state and the registration/sign-in flows.
//!
//! The session is an explicit state object owned by the application
//! controller, not ambient global state. Interested components subscribe
//! through a single `watch` channel and receive every state change
//! (sign-in, sign-out, profile refresh).
//!
//! Registration is a two-step operation — identity record, then profile
//! record — and the steps are not atomic. An identity without a profile is
//! a known inconsistency: profile fetches report it as
//! [`ProfileState::Missing`], a recoverable state with its own repair
//! operation, never a crash and never "no account".

use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::backend::{Backend, IdentityApi, ProfileStore};
use crate::error::{Result, SetuError};
use crate::profile::{NewProfile, Role, UserProfile};

/// An authenticated session issued by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// Identity id; equals the profile id.
    pub user_id: String,
    pub email: String,
    pub access_token: String,
}

/// Whether the signed-in identity has its paired profile record.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileState {
    Loaded(UserProfile),
    /// Identity exists but the profile write never happened (registration
    /// interrupted between its two steps). Repairable via
    /// [`SessionController::repair_profile`].
    Missing,
}

/// The application-wide session state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    SignedOut,
    SignedIn {
        session: AuthSession,
        profile: ProfileState,
    },
}

impl SessionState {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, SessionState::SignedIn { .. })
    }

    /// The loaded profile, if any. `None` both when signed out and when the
    /// profile record is missing.
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionState::SignedIn {
                profile: ProfileState::Loaded(profile),
                ..
            } => Some(profile),
            _ => None,
        }
    }

    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            SessionState::SignedIn { session, .. } => Some(session),
            SessionState::SignedOut => None,
        }
    }

    /// True when the signed-in identity has no profile record.
    pub fn profile_missing(&self) -> bool {
        matches!(
            self,
            SessionState::SignedIn {
                profile: ProfileState::Missing,
                ..
            }
        )
    }
}

/// Owns the session state and drives auth flows against the backend.
pub struct SessionController {
    backend: Backend,
    state: watch::Sender<SessionState>,
}

impl SessionController {
    pub fn new(backend: Backend) -> Self {
        let (state, _) = watch::channel(SessionState::SignedOut);
        Self { backend, state }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The single subscription point for session-change notifications.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Registers a new account: identity record first, then the matching
    /// profile with the role-derived verification status.
    ///
    /// If the profile write fails after the identity succeeded, the state
    /// lands in `SignedIn { profile: Missing }` and the error is returned;
    /// the account is repairable, not lost.
    #[instrument(skip(self, password, role), fields(role = %role))]
    pub async fn sign_up(&self, email: &str, password: &str, role: Role) -> Result<()> {
        validate_credentials(email, password)?;

        let session = self.backend.identity.register(email, password).await?;
        info!("Identity created, creating profile");

        let new_profile = NewProfile::for_registration(session.user_id.clone(), email, role);
        if let Err(e) = self.backend.profiles.create_profile(new_profile).await {
            warn!("Profile creation failed after identity creation: {e}");
            self.state.send_replace(SessionState::SignedIn {
                session,
                profile: ProfileState::Missing,
            });
            return Err(e);
        }

        let profile = self.fetch_profile_state(&session.user_id).await;
        self.state
            .send_replace(SessionState::SignedIn { session, profile });
        Ok(())
    }

    /// Signs in with existing credentials and loads the paired profile.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        validate_credentials(email, password)?;

        let session = self.backend.identity.login(email, password).await?;
        let profile = self.fetch_profile_state(&session.user_id).await;
        if matches!(profile, ProfileState::Missing) {
            warn!("Signed-in identity has no profile record");
        }
        self.state
            .send_replace(SessionState::SignedIn { session, profile });
        Ok(())
    }

    /// Ends the session. Local state is cleared even when the remote
    /// logout fails; a late response cannot resurrect the session.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        let current = self.state();
        if let Some(session) = current.session() {
            if let Err(e) = self.backend.identity.logout(session).await {
                warn!("Remote logout failed, clearing local session anyway: {e}");
            }
        }
        self.state.send_replace(SessionState::SignedOut);
        Ok(())
    }

    /// Refetches the profile for the signed-in identity, e.g. after a
    /// verification submission changed its status.
    pub async fn refresh_profile(&self) -> Result<()> {
        let current = self.state();
        let Some(session) = current.session().cloned() else {
            return Ok(());
        };
        let profile = self.fetch_profile_state(&session.user_id).await;
        self.state
            .send_replace(SessionState::SignedIn { session, profile });
        Ok(())
    }

    /// Recreates the missing profile record for a half-registered identity.
    #[instrument(skip(self, role), fields(role = %role))]
    pub async fn repair_profile(&self, role: Role) -> Result<()> {
        let current = self.state();
        let Some(session) = current.session() else {
            return Err(SetuError::Permission(
                crate::permissions::Denial::SignInRequired,
            ));
        };
        if !current.profile_missing() {
            return Err(SetuError::validation("Profile does not need repair"));
        }

        let new_profile =
            NewProfile::for_registration(session.user_id.clone(), &session.email, role);
        self.backend.profiles.create_profile(new_profile).await?;
        info!("Recreated missing profile record");
        self.refresh_profile().await
    }

    async fn fetch_profile_state(&self, user_id: &str) -> ProfileState {
        match self.backend.profiles.get_profile(user_id).await {
            Ok(Some(profile)) => ProfileState::Loaded(profile),
            Ok(None) => ProfileState::Missing,
            Err(e) => {
                // A fetch failure is not evidence the profile is absent, but
                // the session must still become usable; the next refresh
                // retries.
                warn!("Profile fetch failed: {e}");
                ProfileState::Missing
            }
        }
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(SetuError::validation("Please fill in all fields"));
    }
    if password.len() < 6 {
        return Err(SetuError::validation(
            "Password must be at least 6 characters",
        ));
    }
    Ok(())
}
