//! # API Module
//!
//! HTTP endpoints of the local server that runs while `chipper login` waits
//! for the identity provider's redirect.
//!
//! - [`callback`] receives the PKCE authorization code (or the provider's
//!   error) and hands it to the waiting sign-in flow.
//! - [`health`] reports status and version.
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use chipper::api::{callback, health};
//!
//! let app = Router::new()
//!     .route("/callback", get(callback))
//!     .route("/health", get(health));
//! ```

mod callback;
mod health;

pub use callback::callback;
pub use health::health;
