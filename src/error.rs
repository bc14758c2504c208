//! Error types shared across the showcase.
//!
//! Every layer talking to an external collaborator has its own error enum.
//! None of them are fatal: callers log and degrade to an empty list, a
//! missing token or a dropped command.

use thiserror::Error;

/// Errors raised while reading configuration from the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Errors raised by the identity provider and the session store.
#[derive(Error, Debug)]
pub enum SessionError {
    /// HTTP request to the provider failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Identity provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// The sign-in flow did not complete
    #[error("Sign-in failed: {0}")]
    SignIn(String),

    /// The coordinator already has a live subscription
    #[error("Session events are already subscribed")]
    AlreadySubscribed,

    /// Reading or writing the session store failed
    #[error("Session store error: {0}")]
    Store(#[from] std::io::Error),

    /// The session store holds malformed JSON
    #[error("Malformed session: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised by the Spotify catalog API.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// No delegated token is available
    #[error("Not logged in")]
    NoToken,

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The token was rejected and a renewed one was rejected as well
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// The listener is not allow-listed for this application
    #[error("Access to the catalog was denied: {0}")]
    AccessDenied(String),

    /// Non-success status other than an allow-list rejection
    #[error("Catalog error ({status}): {message}")]
    Status { status: u16, message: String },

    /// The requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Errors raised by playback commands and the playback SDK.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// No delegated token is available
    #[error("Not logged in")]
    NoToken,

    /// No device identifier is known yet
    #[error("Player is not ready")]
    NotReady,

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The token was rejected by the playback API
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The account cannot stream (e.g. no premium subscription)
    #[error("Account error: {0}")]
    Account(String),

    /// Non-success status from the playback API
    #[error("Playback error ({status}): {message}")]
    Status { status: u16, message: String },
}
