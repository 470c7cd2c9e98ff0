//! # SikshaSetu
//!
//! Core library for SikshaSetu, a community platform connecting donors and
//! students for resource and knowledge sharing. Donors post resources and
//! wisdom immediately; students verify their identity before gaining full
//! posting and claiming privileges.
//!
//! Persistence, authentication, binary storage and change notification are
//! delegated to an external backend service reached over HTTP; this crate
//! holds the client-side logic:
//!
//! - **Permission evaluation** ([`permissions`]): the pure rule set gating
//!   posting, claiming, contact-info disclosure, and post ownership.
//! - **Post lifecycle** ([`lifecycle`]): validated creation, owner-only
//!   edit/delete, ordered listing, and render-time contact redaction.
//! - **Feed synchronization** ([`feed`]): debounced full-refetch driven by
//!   the store's change stream.
//! - **Session control** ([`session`]): two-step registration, sign-in,
//!   and the explicit application-wide session state.
//! - **Backend adapters** ([`backend`]): the collaborator interfaces with
//!   HTTP, disabled, and in-memory implementations, selected once at
//!   startup.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sikshasetu::backend::Backend;
//! use sikshasetu::lifecycle::PostManager;
//! use sikshasetu::post::PostDraft;
//! use sikshasetu::profile::Role;
//! use sikshasetu::session::SessionController;
//!
//! # async fn run() -> sikshasetu::Result<()> {
//! let backend = Backend::from_env();
//! let session = SessionController::new(backend.clone());
//! session.sign_up("mentor@example.com", "secret123", Role::Donor).await?;
//!
//! let posts = PostManager::new(backend.posts.clone());
//! let state = session.state();
//! posts
//!     .create(state.profile(), &PostDraft::wisdom("Welcome to the community"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod feed;
pub mod lifecycle;
pub mod permissions;
pub mod post;
pub mod profile;
pub mod session;
pub mod verification;

pub use error::{Result, SetuError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
