use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_LENGTH};
use serde::Serialize;
use tracing::debug;

use crate::{
    config,
    error::PlaybackError,
    player::sdk::PlaybackEndpoint,
    session::TokenSupplier,
    spotify::playback_error,
};

#[derive(Serialize)]
struct PlayRequest<'a> {
    uris: &'a [String],
}

/// `PUT /me/player/play` against the Spotify Web API.
///
/// Starting playback is the one command that does not go through the player
/// device itself, so it is kept apart from [`ConnectPlayer`].
///
/// [`ConnectPlayer`]: crate::spotify::connect::ConnectPlayer
pub struct WebPlaybackEndpoint {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenSupplier>,
}

impl WebPlaybackEndpoint {
    /// Creates an endpoint for the Web API at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Web API root, e.g. `https://api.spotify.com/v1`
    /// * `tokens` - Source of the delegated Spotify token, asked on every call
    ///
    /// # Example
    ///
    /// ```
    /// let endpoint = WebPlaybackEndpoint::new(config::spotify_apiurl(), session.clone());
    /// endpoint.play("device-1", Some(uris.as_slice())).await?;
    /// ```
    pub fn new(base_url: String, tokens: Arc<dyn TokenSupplier>) -> Self {
        WebPlaybackEndpoint {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Creates an endpoint for `SPOTIFY_API_URL`.
    pub fn from_env(tokens: Arc<dyn TokenSupplier>) -> Self {
        Self::new(config::spotify_apiurl(), tokens)
    }
}

#[async_trait]
impl PlaybackEndpoint for WebPlaybackEndpoint {
    /// Loads `uris` on `device_id` and plays them, or resumes without `uris`.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::NoToken`] without a token, before any request
    /// - [`PlaybackError::Authentication`] when the token is rejected
    /// - [`PlaybackError::Account`] when the account has no Premium
    /// - [`PlaybackError::Status`] for any other failed response
    async fn play(&self, device_id: &str, uris: Option<&[String]>) -> Result<(), PlaybackError> {
        let token = self.tokens.token().await.ok_or(PlaybackError::NoToken)?;

        let request = self
            .http
            .put(format!("{}/me/player/play", self.base_url))
            .query(&[("device_id", device_id)])
            .bearer_auth(token);
        let request = match uris {
            Some(uris) => request.json(&PlayRequest { uris }),
            None => request.header(CONTENT_LENGTH, "0"),
        };

        debug!(device_id, tracks = uris.map(|u| u.len()).unwrap_or(0), "Play request");
        playback_error(request.send().await?).await?;
        Ok(())
    }
}
