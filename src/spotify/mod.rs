//! # Spotify Integration Module
//!
//! HTTP clients for the Spotify Web API used by the showcase.
//!
//! ```text
//! CLI / Player controller
//!          ↓
//! Spotify Integration Layer
//!     ├── catalog   (artists, top tracks, albums, playlists, profile)
//!     ├── playback  (PUT /me/player/play)
//!     └── connect   (Spotify Connect device as a PlayerSdk)
//!          ↓
//! HTTP Layer (reqwest, JSON)
//! ```
//!
//! Every request pulls a fresh delegated token from a
//! [`TokenSupplier`](crate::session::TokenSupplier) and sends it as bearer
//! token. No request is retried; failures are returned to the caller, which
//! logs them and degrades.
//!
//! Spotify reports errors as `{"error": {"status": 403, "message": "..."}}`.
//! [`catalog_error`] and [`playback_error`] map those bodies onto the
//! catalog and playback error types.

pub mod catalog;
pub mod connect;
pub mod playback;

use reqwest::{Response, StatusCode};
use serde::Deserialize;

use crate::error::{CatalogError, PlaybackError};

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    reason: Option<String>,
}

fn error_details(body: &str) -> (String, Option<String>) {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(b) => (b.error.message, b.error.reason),
        Err(_) => (body.to_string(), None),
    }
}

/// Passes successful responses through and maps the rest.
pub(crate) async fn catalog_error(res: Response) -> Result<Response, CatalogError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let (message, _) = error_details(&res.text().await.unwrap_or_default());
    Err(match status {
        StatusCode::UNAUTHORIZED => CatalogError::Unauthorized(message),
        StatusCode::FORBIDDEN => CatalogError::AccessDenied(message),
        StatusCode::NOT_FOUND => CatalogError::NotFound(message),
        _ => CatalogError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

/// Passes successful responses through and maps the rest.
pub(crate) async fn playback_error(res: Response) -> Result<Response, PlaybackError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let (message, reason) = error_details(&res.text().await.unwrap_or_default());
    Err(match status {
        StatusCode::UNAUTHORIZED => PlaybackError::Authentication(message),
        StatusCode::FORBIDDEN if reason.as_deref() == Some("PREMIUM_REQUIRED") => {
            PlaybackError::Account(message)
        }
        _ => PlaybackError::Status {
            status: status.as_u16(),
            message,
        },
    })
}
