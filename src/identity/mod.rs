//! # Identity provider
//!
//! The identity provider owns sign-in, sign-out and the stored session. The
//! rest of the showcase only sees it through [`IdentityProvider`], which
//! keeps the session coordinator testable without a live provider.
//!
//! Session changes are pushed as [`AuthEvent`]s over a broadcast channel.
//! Every successful sign-in, refresh and sign-out publishes exactly one
//! event.

mod supabase;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    error::SessionError,
    types::{AuthEvent, Session},
};

pub use supabase::SupabaseAuth;

/// OAuth provider name used for sign-in.
pub const SPOTIFY_PROVIDER: &str = "spotify";

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Runs the interactive sign-in flow for `provider` with `scopes`.
    async fn sign_in(&self, provider: &str, scopes: &str) -> Result<Session, SessionError>;

    /// Ends the session locally and at the provider.
    async fn sign_out(&self) -> Result<(), SessionError>;

    /// Returns the stored session, if any.
    async fn get_session(&self) -> Result<Option<Session>, SessionError>;

    /// Exchanges the refresh token of `current` for a new session.
    async fn refresh_session(&self, current: &Session) -> Result<Session, SessionError>;

    /// Subscribes to session-change events.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
