use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tabled::Tabled;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    /// Delegated Spotify token used for catalog and playback calls.
    #[serde(default)]
    pub provider_token: Option<String>,
    #[serde(default)]
    pub provider_refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<SessionUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Session change pushed by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

/// Shared between the sign-in flow and the callback handler.
#[derive(Debug, Clone, Default)]
pub struct PkceState {
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PkceExchangeRequest<'a> {
    pub auth_code: &'a str,
    pub code_verifier: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshSessionRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistSearchResponse {
    pub artists: ArtistPage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistPage {
    #[serde(default)]
    pub items: Vec<Artist>,
}

/// Track object as returned by top-track and playlist endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopTracksResponse {
    #[serde(default)]
    pub tracks: Vec<CatalogTrack>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumTracksResponse {
    #[serde(default)]
    pub items: Vec<CatalogTrack>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistTracksResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Null for tracks that were removed from the catalog.
    #[serde(default)]
    pub track: Option<CatalogTrack>,
}

/// Album and playlist detail responses share these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDetails {
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Listing row shown to the listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub name: String,
    pub uri: String,
    pub cover_art: Option<String>,
    pub album_name: String,
    pub artist_name: String,
    pub duration_ms: u64,
    pub popularity: Option<u32>,
}

impl Track {
    /// Builds a row, using `album` for tracks whose payload carries no album.
    pub fn from_catalog(track: CatalogTrack, album: Option<&CollectionDetails>) -> Self {
        let (album_name, cover_art) = match (&track.album, album) {
            (Some(a), _) if !a.name.is_empty() => {
                (a.name.clone(), a.images.first().map(|i| i.url.clone()))
            }
            (_, Some(details)) => (
                details.name.clone(),
                details.images.first().map(|i| i.url.clone()),
            ),
            _ => (String::new(), None),
        };

        Self {
            artist_name: track
                .artists
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            name: track.name,
            uri: track.uri,
            cover_art,
            album_name,
            duration_ms: track.duration_ms,
            popularity: track.popularity,
        }
    }
}

#[derive(Tabled)]
pub struct TrackTableRow {
    #[tabled(rename = "#")]
    pub index: usize,
    pub track: String,
    pub album: String,
    pub artist: String,
    pub duration: String,
}

#[derive(Tabled)]
pub struct CollectionTableRow {
    pub key: String,
    pub title: String,
}

/// A curated collection of tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection {
    TopTracks { artist: String },
    Album { id: String },
    Playlist { id: String },
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <kind>:<value>, got '{}'", s))?;
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("missing value in '{}'", s));
        }

        match kind.trim().to_lowercase().as_str() {
            "top" => Ok(Collection::TopTracks {
                artist: value.to_string(),
            }),
            "album" => Ok(Collection::Album {
                id: value.to_string(),
            }),
            "playlist" => Ok(Collection::Playlist {
                id: value.to_string(),
            }),
            other => Err(format!(
                "unknown collection kind '{}', use top, album or playlist",
                other
            )),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::TopTracks { artist } => write!(f, "top:{}", artist),
            Collection::Album { id } => write!(f, "album:{}", id),
            Collection::Playlist { id } => write!(f, "playlist:{}", id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSummary {
    pub title: String,
    pub cover_art: Option<String>,
}

/// Result of loading a collection for display.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Tracks(Vec<Track>),
    /// The listener must ask to be allow-listed before browsing.
    AccessDenied,
    /// No token, or the catalog rejected it even after a refresh.
    SignedOut,
}

impl Listing {
    pub fn tracks(&self) -> &[Track] {
        match self {
            Listing::Tracks(tracks) => tracks,
            Listing::AccessDenied | Listing::SignedOut => &[],
        }
    }
}
