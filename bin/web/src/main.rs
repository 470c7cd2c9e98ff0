//! Web interface binary for SikshaSetu.
//!
//! A local single-user web client over the core library: the feed,
//! profile, privacy, and verification pages selected through the `page`
//! query parameter, with form posts driving registration, posting, and
//! verification uploads. The backend adapter is chosen once at startup;
//! `SETU_DEMO=1` runs entirely against the in-memory backend.

use std::env;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sikshasetu::backend::Backend;
use sikshasetu::feed::{FeedSynchronizer, DEFAULT_DEBOUNCE};
use sikshasetu::lifecycle::PostManager;
use sikshasetu::session::SessionController;
use sikshasetu::verification::VerificationService;

mod csrf;
mod handlers;
mod templates;

use csrf::CsrfStore;

/// Upload ceiling is 5 MB; leave headroom for the multipart envelope.
const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

/// The application controller: backend handles plus the stateful services
/// every handler works through.
pub struct AppCore {
    pub backend: Backend,
    pub session: SessionController,
    pub posts: PostManager,
    pub feed: Arc<FeedSynchronizer>,
    pub verification: VerificationService,
}

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<AppCore>,
    pub csrf_store: CsrfStore,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sikshasetu=info,sikshasetu_web=info".into()),
        )
        .init();

    let backend = if env::var("SETU_DEMO").is_ok() {
        info!("SETU_DEMO set; running against the in-memory backend");
        Backend::memory()
    } else {
        Backend::from_env()
    };

    let session = SessionController::new(backend.clone());
    let posts = PostManager::new(backend.posts.clone());
    let verification =
        VerificationService::new(backend.profiles.clone(), backend.documents.clone());

    let feed = FeedSynchronizer::new(backend.posts.clone());
    feed.spawn(DEFAULT_DEBOUNCE);
    if backend.is_available() {
        if let Err(e) = feed.refresh().await {
            warn!("Initial feed fetch failed: {e}");
        }
    }

    let state = AppState {
        core: Arc::new(AppCore {
            backend,
            session,
            posts,
            feed,
            verification,
        }),
        csrf_store: CsrfStore::new(),
    };

    let session_layer = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);

    let app = Router::new()
        .route("/", get(handlers::page))
        .route("/auth/signup", post(handlers::sign_up))
        .route("/auth/signin", post(handlers::sign_in))
        .route("/auth/signout", post(handlers::sign_out))
        .route("/profile/repair", post(handlers::repair_profile))
        .route("/posts/create", post(handlers::create_post))
        .route(
            "/posts/:id/edit",
            get(handlers::edit_post_page).post(handlers::update_post),
        )
        .route(
            "/posts/:id/delete",
            get(handlers::confirm_delete_page).post(handlers::delete_post),
        )
        .route("/posts/:id/claim", post(handlers::claim_resource))
        .route("/verification/upload", post(handlers::upload_verification))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(session_layer)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state);

    let bind_addr = env::var("SETU_WEB_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("SikshaSetu web interface running on http://{bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
