//! # CLI Module
//!
//! User-facing commands of chipper. Each command wires the library layers
//! together and reports progress with the crate's colored output macros.
//!
//! ## Commands
//!
//! - [`login`] - Signs in with Spotify through the identity provider
//! - [`logout`] - Ends the session and removes it from disk
//! - [`whoami`] - Shows the Spotify profile of the signed-in listener
//! - [`list_collections`] - Lists the curated collections with their titles
//! - [`list_tracks`] - Shows the tracks of one collection
//! - [`play`] - Plays a collection on a Spotify Connect device
//!
//! ## Layering
//!
//! ```text
//! CLI Layer (commands, tables, progress)
//!     ↓
//! Session coordinator / playback controller
//!     ↓
//! Identity provider, Spotify Web API
//! ```

use std::{sync::Arc, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    config, error,
    identity::{IdentityProvider, SupabaseAuth},
    session::SessionCoordinator,
    warning,
};

mod auth;
mod collections;
mod play;

pub use auth::login;
pub use auth::logout;
pub use auth::whoami;
pub use collections::list_collections;
pub use collections::list_tracks;
pub use play::play;

/// Session coordinator primed from the stored session.
async fn open_session() -> Arc<SessionCoordinator> {
    let auth = match SupabaseAuth::from_env() {
        Ok(auth) => auth,
        Err(e) => error!("Cannot set up the identity provider. Err: {}", e),
    };
    let provider: Arc<dyn IdentityProvider> = Arc::new(auth);
    let session = SessionCoordinator::new(provider);
    session.load().await;
    session
}

/// Like [`open_session`], but warns when nobody is signed in.
async fn require_session() -> Option<Arc<SessionCoordinator>> {
    let session = open_session().await;
    if session.get_token().is_none() {
        signed_out_notice();
        return None;
    }
    Some(session)
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb
}

fn signed_out_notice() {
    warning!("Not signed in. Run `chipper login` first.");
}

fn access_denied_notice() {
    warning!("Your Spotify account is not on this showcase's allow list yet.");
    match config::access_contact() {
        Some(contact) => warning!("Ask for access at {}", contact),
        None => warning!("Ask the showcase owner to add your account."),
    }
}
