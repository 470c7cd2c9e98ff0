//! Page and form handlers for the SikshaSetu web interface.
//!
//! Every mutating handler re-checks its permission predicate even though
//! the pages already hide disallowed controls; a denial here is resolved
//! locally and never reaches the backend. Validation and permission
//! failures surface as flash messages without incident logging; backend
//! failures are logged and shown in simplified form.

use askama::Template;
use axum::extract::{Form, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, Redirect};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{error, instrument, warn};

use sikshasetu::backend::PostStore;
use sikshasetu::error::{AuthFailure, SetuError};
use sikshasetu::lifecycle::render_feed;
use sikshasetu::permissions;
use sikshasetu::post::{PostBody, PostDraft, PostType};
use sikshasetu::profile::Role;
use sikshasetu::verification::UploadedDocument;

use crate::csrf::{csrf_token, validate_csrf, CsrfForm};
use crate::templates::{
    category_options, ConfirmDeleteTemplate, EditPostTemplate, FeedTemplate, PostCard,
    PrivacyTemplate, ProfileInfo, ProfileTemplate, VerificationTemplate,
};
use crate::AppState;

const FLASH_OK: &str = "flash_ok";
const FLASH_ERROR: &str = "flash_error";
const COMPOSER_DRAFT: &str = "composer_draft";

// =============================================================================
// Helpers
// =============================================================================

fn render_template<T: Template>(template: T) -> Result<Html<String>, StatusCode> {
    template.render().map(Html).map_err(|e| {
        error!("Template rendering failed: {e:?}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn flash(session: &Session, message: impl Into<String>) {
    if let Err(e) = session.insert(FLASH_OK, message.into()).await {
        warn!("Failed to store flash message: {e}");
    }
}

async fn flash_error(session: &Session, message: impl Into<String>) {
    if let Err(e) = session.insert(FLASH_ERROR, message.into()).await {
        warn!("Failed to store flash message: {e}");
    }
}

async fn take_flash(session: &Session) -> (Option<String>, Option<String>) {
    let ok = session.remove::<String>(FLASH_OK).await.ok().flatten();
    let err = session.remove::<String>(FLASH_ERROR).await.ok().flatten();
    (ok, err)
}

/// Reports an operation failure to the user. Local failures (validation,
/// permission) are not incidents; everything else goes to the log.
async fn report(session: &Session, err: &SetuError) {
    if !err.is_local() {
        error!("Operation failed: {err}");
    }
    flash_error(session, err.to_string()).await;
}

// =============================================================================
// Page Dispatch
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
    auth: Option<String>,
}

/// Routes `/?page=...` to the selected page; the feed is the default.
pub async fn page(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, StatusCode> {
    match query.page.as_deref().unwrap_or("feed") {
        "profile" => profile_page(&state, &session).await,
        "privacy" => privacy_page(&session).await,
        "verification" => verification_page(&state, &session).await,
        _ => feed_page(&state, &session, query.auth.as_deref()).await,
    }
}

async fn feed_page(
    state: &AppState,
    session: &Session,
    auth_mode: Option<&str>,
) -> Result<Html<String>, StatusCode> {
    let (flash, flash_error) = take_flash(session).await;
    let csrf_token = csrf_token(session, &state.csrf_store).await;
    let draft: ComposerForm = session
        .remove(COMPOSER_DRAFT)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();

    let auth_state = state.core.session.state();
    let viewer = auth_state.profile();

    let posts = state.core.feed.current();
    let cards: Vec<PostCard> = render_feed(&posts, viewer)
        .iter()
        .map(PostCard::from_view)
        .collect();

    let posting_hint = match permissions::check_post(viewer) {
        Ok(_) => "Share your thoughts with the community!".to_string(),
        Err(denial) => denial.to_string(),
    };

    render_template(FeedTemplate {
        active_page: "feed".to_string(),
        flash,
        flash_error,
        backend_available: state.core.backend.is_available(),
        signed_in: auth_state.is_signed_in(),
        profile: viewer.map(ProfileInfo::from_profile),
        profile_missing: auth_state.profile_missing(),
        auth_mode: auth_mode.unwrap_or("signup").to_string(),
        can_post: permissions::can_post(viewer),
        posting_hint,
        posts: cards,
        categories: category_options(),
        draft,
        csrf_token,
    })
}

async fn profile_page(state: &AppState, session: &Session) -> Result<Html<String>, StatusCode> {
    let (flash, flash_error) = take_flash(session).await;
    let csrf_token = csrf_token(session, &state.csrf_store).await;
    let auth_state = state.core.session.state();

    render_template(ProfileTemplate {
        active_page: "profile".to_string(),
        flash,
        flash_error,
        backend_available: state.core.backend.is_available(),
        signed_in: auth_state.is_signed_in(),
        profile: auth_state.profile().map(ProfileInfo::from_profile),
        profile_missing: auth_state.profile_missing(),
        csrf_token,
    })
}

async fn privacy_page(session: &Session) -> Result<Html<String>, StatusCode> {
    let (flash, flash_error) = take_flash(session).await;
    render_template(PrivacyTemplate {
        active_page: "privacy".to_string(),
        flash,
        flash_error,
    })
}

async fn verification_page(
    state: &AppState,
    session: &Session,
) -> Result<Html<String>, StatusCode> {
    let (flash, flash_error) = take_flash(session).await;
    let csrf_token = csrf_token(session, &state.csrf_store).await;
    let auth_state = state.core.session.state();
    let profile = auth_state.profile();

    render_template(VerificationTemplate {
        active_page: "verification".to_string(),
        flash,
        flash_error,
        backend_available: state.core.backend.is_available(),
        signed_in: profile.is_some(),
        is_donor: profile.map(|p| p.role == Role::Donor).unwrap_or(false),
        is_verified: profile.map(|p| p.is_verified()).unwrap_or(false),
        is_pending: profile
            .map(|p| {
                p.verification_status == sikshasetu::profile::VerificationStatus::Pending
            })
            .unwrap_or(false),
        csrf_token,
    })
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    email: String,
    password: String,
    role: String,
}

#[instrument(skip(state, session, form), fields(role = %form.data.role))]
pub async fn sign_up(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CsrfForm<SignUpForm>>,
) -> Result<Redirect, StatusCode> {
    if !validate_csrf(&session, &state.csrf_store, &form.csrf_token) {
        return Err(StatusCode::FORBIDDEN);
    }

    let role = match form.data.role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            report(&session, &e).await;
            return Ok(Redirect::to("/?page=feed"));
        }
    };

    match state
        .core
        .session
        .sign_up(&form.data.email, &form.data.password, role)
        .await
    {
        Ok(()) => {
            let welcome = match role {
                Role::Donor => {
                    "Registration successful! You can start sharing resources immediately."
                }
                Role::Student => {
                    "Registration successful! Verify your student status to unlock posting and claiming."
                }
            };
            flash(&session, welcome).await;
            Ok(Redirect::to("/?page=feed"))
        }
        Err(e) => {
            let auth_mode = if e.auth_failure() == Some(AuthFailure::AccountExists) {
                // The account exists: switch the form to sign-in mode.
                "signin"
            } else {
                "signup"
            };
            report(&session, &e).await;
            Ok(Redirect::to(&format!("/?page=feed&auth={auth_mode}")))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    email: String,
    password: String,
}

#[instrument(skip(state, session, form))]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CsrfForm<SignInForm>>,
) -> Result<Redirect, StatusCode> {
    if !validate_csrf(&session, &state.csrf_store, &form.csrf_token) {
        return Err(StatusCode::FORBIDDEN);
    }

    match state
        .core
        .session
        .sign_in(&form.data.email, &form.data.password)
        .await
    {
        Ok(()) => {
            flash(&session, "Welcome back to SikshaSetu!").await;
            Ok(Redirect::to("/?page=feed"))
        }
        Err(e) => {
            report(&session, &e).await;
            Ok(Redirect::to("/?page=feed&auth=signin"))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmptyForm {}

pub async fn sign_out(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CsrfForm<EmptyForm>>,
) -> Result<Redirect, StatusCode> {
    if !validate_csrf(&session, &state.csrf_store, &form.csrf_token) {
        return Err(StatusCode::FORBIDDEN);
    }

    match state.core.session.sign_out().await {
        Ok(()) => flash(&session, "Signed out.").await,
        Err(e) => report(&session, &e).await,
    }
    Ok(Redirect::to("/?page=feed"))
}

#[derive(Debug, Deserialize)]
pub struct RepairForm {
    role: String,
}

/// Recreates the profile record for a half-registered identity.
pub async fn repair_profile(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CsrfForm<RepairForm>>,
) -> Result<Redirect, StatusCode> {
    if !validate_csrf(&session, &state.csrf_store, &form.csrf_token) {
        return Err(StatusCode::FORBIDDEN);
    }

    let result = match form.data.role.parse::<Role>() {
        Ok(role) => state.core.session.repair_profile(role).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => flash(&session, "Profile restored. Welcome back!").await,
        Err(e) => report(&session, &e).await,
    }
    Ok(Redirect::to("/?page=profile"))
}

// =============================================================================
// Posts
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ComposerForm {
    #[serde(default)]
    pub post_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub resource_title: String,
    #[serde(default)]
    pub resource_category: String,
    #[serde(default)]
    pub resource_contact: String,
}

impl ComposerForm {
    fn draft(&self) -> PostDraft {
        PostDraft {
            post_type: self.post_type.clone(),
            content: self.content.clone(),
            resource_title: self.resource_title.clone(),
            resource_category: self.resource_category.clone(),
            resource_contact: self.resource_contact.clone(),
        }
    }
}

#[instrument(skip(state, session, form), fields(post_type = %form.data.post_type))]
pub async fn create_post(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CsrfForm<ComposerForm>>,
) -> Result<Redirect, StatusCode> {
    if !validate_csrf(&session, &state.csrf_store, &form.csrf_token) {
        return Err(StatusCode::FORBIDDEN);
    }

    let auth_state = state.core.session.state();
    let draft = form.data.draft();

    match state.core.posts.create(auth_state.profile(), &draft).await {
        Ok(post) => {
            let message = match post.post_type() {
                PostType::Wisdom => "Wisdom shared!",
                PostType::Donation => "Resource posted!",
            };
            state.core.feed.insert_local(post);
            flash(&session, message).await;
        }
        Err(e) => {
            // Keep the draft so resubmission is a matter of fixing one field.
            if let Err(e) = session.insert(COMPOSER_DRAFT, &form.data).await {
                warn!("Failed to preserve composer draft: {e}");
            }
            report(&session, &e).await;
        }
    }
    Ok(Redirect::to("/?page=feed"))
}

/// Loads the edit form for an owned post.
pub async fn edit_post_page(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<String>,
) -> Result<Html<String>, StatusCode> {
    let (flash_ok, flash_err) = take_flash(&session).await;
    let csrf = csrf_token(&session, &state.csrf_store).await;
    let auth_state = state.core.session.state();

    let post = match state.core.backend.posts.get_post(&post_id).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            flash_error(&session, "Post not found").await;
            return render_redirect_notice();
        }
        Err(e) => {
            report(&session, &e).await;
            return render_redirect_notice();
        }
    };

    if let Err(denial) = permissions::check_edit_or_delete(auth_state.profile(), &post) {
        flash_error(&session, denial.to_string()).await;
        return render_redirect_notice();
    }

    let (is_wisdom, content, title, category, contact) = match &post.body {
        PostBody::Wisdom { content } => {
            (true, content.clone(), String::new(), String::new(), String::new())
        }
        PostBody::Donation {
            resource_title,
            resource_category,
            resource_contact,
        } => (
            false,
            String::new(),
            resource_title.clone(),
            resource_category.as_str().to_string(),
            resource_contact.clone(),
        ),
    };

    render_template(EditPostTemplate {
        active_page: "feed".to_string(),
        flash: flash_ok,
        flash_error: flash_err,
        post_id,
        is_wisdom,
        content,
        resource_title: title,
        resource_category: category,
        resource_contact: contact,
        categories: category_options(),
        csrf_token: csrf,
    })
}

/// Tiny interstitial for flows that bail back to the feed.
fn render_redirect_notice() -> Result<Html<String>, StatusCode> {
    Ok(Html(
        "<!DOCTYPE html><html><head><meta http-equiv=\"refresh\" content=\"0; url=/?page=feed\"></head><body></body></html>"
            .to_string(),
    ))
}

#[instrument(skip(state, session, form))]
pub async fn update_post(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<String>,
    Form(form): Form<CsrfForm<ComposerForm>>,
) -> Result<Redirect, StatusCode> {
    if !validate_csrf(&session, &state.csrf_store, &form.csrf_token) {
        return Err(StatusCode::FORBIDDEN);
    }

    let auth_state = state.core.session.state();
    match state
        .core
        .posts
        .edit(auth_state.profile(), &post_id, &form.data.draft())
        .await
    {
        Ok(()) => {
            refresh_feed(&state).await;
            flash(&session, "Post updated successfully!").await;
        }
        Err(e) => report(&session, &e).await,
    }
    Ok(Redirect::to("/?page=feed"))
}

/// The explicit confirmation step before an irreversible delete.
pub async fn confirm_delete_page(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<String>,
) -> Result<Html<String>, StatusCode> {
    let (flash_ok, flash_err) = take_flash(&session).await;
    let csrf = csrf_token(&session, &state.csrf_store).await;
    let auth_state = state.core.session.state();

    let post = match state.core.backend.posts.get_post(&post_id).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            flash_error(&session, "Post not found").await;
            return render_redirect_notice();
        }
        Err(e) => {
            report(&session, &e).await;
            return render_redirect_notice();
        }
    };

    if let Err(denial) = permissions::check_edit_or_delete(auth_state.profile(), &post) {
        flash_error(&session, denial.to_string()).await;
        return render_redirect_notice();
    }

    let summary = match &post.body {
        PostBody::Wisdom { content } => truncate(content, 80),
        PostBody::Donation { resource_title, .. } => truncate(resource_title, 80),
    };

    render_template(ConfirmDeleteTemplate {
        active_page: "feed".to_string(),
        flash: flash_ok,
        flash_error: flash_err,
        post_id,
        summary,
        csrf_token: csrf,
    })
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    #[serde(default)]
    confirmed: String,
}

#[instrument(skip(state, session, form))]
pub async fn delete_post(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<String>,
    Form(form): Form<CsrfForm<DeleteForm>>,
) -> Result<Redirect, StatusCode> {
    if !validate_csrf(&session, &state.csrf_store, &form.csrf_token) {
        return Err(StatusCode::FORBIDDEN);
    }

    let auth_state = state.core.session.state();
    let confirmed = form.data.confirmed == "true";
    match state
        .core
        .posts
        .delete(auth_state.profile(), &post_id, confirmed)
        .await
    {
        Ok(()) => {
            refresh_feed(&state).await;
            flash(&session, "Post deleted successfully!").await;
        }
        Err(e) => report(&session, &e).await,
    }
    Ok(Redirect::to("/?page=feed"))
}

/// Reveals the donor's contact to an entitled student.
pub async fn claim_resource(
    State(state): State<AppState>,
    session: Session,
    Path(post_id): Path<String>,
    Form(form): Form<CsrfForm<EmptyForm>>,
) -> Result<Redirect, StatusCode> {
    if !validate_csrf(&session, &state.csrf_store, &form.csrf_token) {
        return Err(StatusCode::FORBIDDEN);
    }

    let auth_state = state.core.session.state();
    if let Err(denial) = permissions::check_claim_resource(auth_state.profile()) {
        flash_error(&session, denial.to_string()).await;
        return Ok(Redirect::to("/?page=feed"));
    }

    match state.core.backend.posts.get_post(&post_id).await {
        Ok(Some(post)) => match &post.body {
            PostBody::Donation {
                resource_contact, ..
            } => {
                flash(&session, format!("Contact the donor: {resource_contact}")).await;
            }
            PostBody::Wisdom { .. } => {
                flash_error(&session, "Only donated resources can be claimed").await;
            }
        },
        Ok(None) => flash_error(&session, "Post not found").await,
        Err(e) => report(&session, &e).await,
    }
    Ok(Redirect::to("/?page=feed"))
}

async fn refresh_feed(state: &AppState) {
    if let Err(e) = state.core.feed.refresh().await {
        warn!("Feed refresh after mutation failed: {e}");
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}

// =============================================================================
// Verification
// =============================================================================

#[instrument(skip(state, session, multipart))]
pub async fn upload_verification(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Redirect, StatusCode> {
    let mut token = String::new();
    let mut document: Option<UploadedDocument> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("csrf_token") => {
                token = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            }
            Some("document") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?
                    .to_vec();
                document = Some(UploadedDocument {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    if !validate_csrf(&session, &state.csrf_store, &token) {
        return Err(StatusCode::FORBIDDEN);
    }

    let auth_state = state.core.session.state();
    let Some(profile) = auth_state.profile() else {
        flash_error(&session, "Please sign in to access verification").await;
        return Ok(Redirect::to("/?page=verification"));
    };
    let Some(document) = document else {
        flash_error(&session, "Please select a file to upload").await;
        return Ok(Redirect::to("/?page=verification"));
    };

    match state.core.verification.submit(profile, document).await {
        Ok(()) => {
            if let Err(e) = state.core.session.refresh_profile().await {
                warn!("Profile refresh after verification submit failed: {e}");
            }
            flash(
                &session,
                "Verification document uploaded successfully! Your verification is now pending review.",
            )
            .await;
        }
        Err(e) => report(&session, &e).await,
    }
    Ok(Redirect::to("/?page=verification"))
}
