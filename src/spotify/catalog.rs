use std::sync::Arc;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    config,
    error::CatalogError,
    session::TokenSupplier,
    spotify::catalog_error,
    types::{
        AlbumTracksResponse, Artist, ArtistSearchResponse, Collection, CollectionDetails,
        CollectionSummary, Listing, PlaylistTracksResponse, Profile, TopTracksResponse, Track,
    },
};

/// Read-only client for the Spotify catalog.
///
/// Every request asks the [`TokenSupplier`] for a token first. A request the
/// API rejects with 401 is retried once with the token returned by
/// [`TokenSupplier::renew`]; a second rejection surfaces as
/// [`CatalogError::Unauthorized`].
pub struct CatalogClient {
    http: Client,
    base_url: String,
    market: String,
    tokens: Arc<dyn TokenSupplier>,
}

impl CatalogClient {
    /// Creates a client for the Web API at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Web API root, e.g. `https://api.spotify.com/v1`. A
    ///   trailing slash is ignored.
    /// * `market` - ISO country code used for top-track lookups
    /// * `tokens` - Source of the delegated Spotify token
    ///
    /// # Example
    ///
    /// ```
    /// let catalog = CatalogClient::new(
    ///     "https://api.spotify.com/v1".to_string(),
    ///     "US".to_string(),
    ///     session.clone(),
    /// );
    /// ```
    pub fn new(base_url: String, market: String, tokens: Arc<dyn TokenSupplier>) -> Self {
        CatalogClient {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            market,
            tokens,
        }
    }

    /// Creates a client from `SPOTIFY_API_URL` and `SPOTIFY_MARKET`.
    pub fn from_env(tokens: Arc<dyn TokenSupplier>) -> Self {
        Self::new(config::spotify_apiurl(), config::market(), tokens)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let token = self.tokens.token().await.ok_or(CatalogError::NoToken)?;

        match self.send(path, query, &token).await {
            Err(CatalogError::Unauthorized(message)) => {
                debug!(path, "Catalog rejected the token, renewing");
                match self.tokens.renew(&token).await {
                    Some(fresh) if fresh != token => self.send(path, query, &fresh).await,
                    _ => Err(CatalogError::Unauthorized(message)),
                }
            }
            other => other,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        token: &str,
    ) -> Result<T, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Catalog request");

        let res = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(token)
            .send()
            .await?;
        let res = catalog_error(res).await?;
        Ok(res.json::<T>().await?)
    }

    /// Searches the catalog for an artist by name.
    ///
    /// # Arguments
    ///
    /// * `name` - Free text artist name, e.g. `"Renzo Sy"`
    ///
    /// # Returns
    ///
    /// The best match, or [`CatalogError::NotFound`] when the search has no
    /// artist results.
    pub async fn search_artist(&self, name: &str) -> Result<Artist, CatalogError> {
        let res: ArtistSearchResponse = self
            .get("/search", &[("q", name), ("type", "artist"), ("limit", "1")])
            .await?;
        res.artists
            .items
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::NotFound(format!("artist '{}'", name)))
    }

    /// Returns an artist's top tracks in the configured market.
    ///
    /// # Arguments
    ///
    /// * `artist_id` - Spotify artist id as returned by [`Self::search_artist`]
    ///
    /// # Returns
    ///
    /// The tracks in the order Spotify ranks them, each carrying its own
    /// album name and cover art.
    pub async fn top_tracks(&self, artist_id: &str) -> Result<Vec<Track>, CatalogError> {
        let res: TopTracksResponse = self
            .get(
                &format!("/artists/{}/top-tracks", artist_id),
                &[("market", self.market.as_str())],
            )
            .await?;
        Ok(res
            .tracks
            .into_iter()
            .map(|t| Track::from_catalog(t, None))
            .collect())
    }

    /// Fetches the name and images of an album.
    ///
    /// # Arguments
    ///
    /// * `id` - Spotify album id
    pub async fn album(&self, id: &str) -> Result<CollectionDetails, CatalogError> {
        self.get(&format!("/albums/{}", id), &[]).await
    }

    /// Fetches the tracks of an album.
    ///
    /// Album track objects carry no album, so the rows get their album name
    /// and cover art from `album` when it is given.
    ///
    /// # Arguments
    ///
    /// * `id` - Spotify album id
    /// * `album` - Details from [`Self::album`], if already known
    ///
    /// # Returns
    ///
    /// The album's tracks in disc order.
    pub async fn album_tracks(
        &self,
        id: &str,
        album: Option<&CollectionDetails>,
    ) -> Result<Vec<Track>, CatalogError> {
        let res: AlbumTracksResponse = self.get(&format!("/albums/{}/tracks", id), &[]).await?;
        Ok(res
            .items
            .into_iter()
            .map(|t| Track::from_catalog(t, album))
            .collect())
    }

    /// Fetches the name and images of a playlist.
    ///
    /// # Arguments
    ///
    /// * `id` - Spotify playlist id
    pub async fn playlist(&self, id: &str) -> Result<CollectionDetails, CatalogError> {
        self.get(&format!("/playlists/{}", id), &[("fields", "name,images")])
            .await
    }

    /// Fetches the tracks of a playlist.
    ///
    /// Items whose track was removed from the catalog come back as `null`
    /// and are skipped.
    ///
    /// # Arguments
    ///
    /// * `id` - Spotify playlist id
    pub async fn playlist_tracks(&self, id: &str) -> Result<Vec<Track>, CatalogError> {
        let res: PlaylistTracksResponse =
            self.get(&format!("/playlists/{}/tracks", id), &[]).await?;
        Ok(res
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .map(|t| Track::from_catalog(t, None))
            .collect())
    }

    /// Profile picture of the first artist matching `name`.
    ///
    /// # Returns
    ///
    /// The URL of the artist's largest image, or `None` when the artist has
    /// no images.
    pub async fn artist_picture(&self, name: &str) -> Result<Option<String>, CatalogError> {
        let found = self.search_artist(name).await?;
        let artist: Artist = self.get(&format!("/artists/{}", found.id), &[]).await?;
        Ok(artist.images.first().map(|i| i.url.clone()))
    }

    /// Spotify profile of the signed-in listener.
    pub async fn profile(&self) -> Result<Profile, CatalogError> {
        self.get("/me", &[]).await
    }

    /// Resolves a collection into its tracks.
    ///
    /// Top-track collections search the artist first. Album collections
    /// fetch details and tracks concurrently; when the details fail the
    /// tracks are returned without album name and cover.
    ///
    /// # Arguments
    ///
    /// * `collection` - The collection to resolve
    ///
    /// # Example
    ///
    /// ```
    /// let collection: Collection = "album:4aawyAB9vmqN3uQ7FjRGTy".parse()?;
    /// let tracks = catalog.collection_tracks(&collection).await?;
    /// ```
    pub async fn collection_tracks(&self, collection: &Collection) -> Result<Vec<Track>, CatalogError> {
        match collection {
            Collection::TopTracks { artist } => {
                let found = self.search_artist(artist).await?;
                self.top_tracks(&found.id).await
            }
            Collection::Album { id } => {
                let (details, tracks) = tokio::join!(self.album(id), self.album_tracks(id, None));
                let tracks = tracks?;
                match details {
                    Ok(details) => Ok(tracks
                        .into_iter()
                        .map(|t| fill_album(t, &details))
                        .collect()),
                    Err(e) => {
                        warn!(album = %id, error = %e, "Failed to load album details");
                        Ok(tracks)
                    }
                }
            }
            Collection::Playlist { id } => self.playlist_tracks(id).await,
        }
    }

    /// Tracks of `collection` for display.
    ///
    /// Never fails. The outcome is one of:
    ///
    /// - [`Listing::Tracks`] with the tracks, or empty after any other
    ///   failure, which is logged
    /// - [`Listing::AccessDenied`] when the listener is not allow-listed
    /// - [`Listing::SignedOut`] when there is no token or the token was
    ///   rejected even after a renewal
    pub async fn load_collection(&self, collection: &Collection) -> Listing {
        match self.collection_tracks(collection).await {
            Ok(tracks) => Listing::Tracks(tracks),
            Err(CatalogError::AccessDenied(message)) => {
                warn!(collection = %collection, reason = %message, "Catalog access denied");
                Listing::AccessDenied
            }
            Err(CatalogError::NoToken) => Listing::SignedOut,
            Err(CatalogError::Unauthorized(message)) => {
                warn!(collection = %collection, reason = %message, "Catalog rejected the session");
                Listing::SignedOut
            }
            Err(e) => {
                warn!(collection = %collection, error = %e, "Failed to load collection");
                Listing::Tracks(Vec::new())
            }
        }
    }

    /// Title and cover art of `collection`.
    ///
    /// Top-track collections are titled `"<artist>'s Top Songs"` and use the
    /// artist's picture; albums and playlists use their own name and first
    /// image.
    ///
    /// # Returns
    ///
    /// The summary, or the catalog error for the caller to degrade on.
    pub async fn collection_summary(
        &self,
        collection: &Collection,
    ) -> Result<CollectionSummary, CatalogError> {
        match collection {
            Collection::TopTracks { artist } => Ok(CollectionSummary {
                title: format!("{}'s Top Songs", artist),
                cover_art: self.artist_picture(artist).await?,
            }),
            Collection::Album { id } => Ok(summary_of(self.album(id).await?)),
            Collection::Playlist { id } => Ok(summary_of(self.playlist(id).await?)),
        }
    }
}

fn summary_of(details: CollectionDetails) -> CollectionSummary {
    CollectionSummary {
        cover_art: details.images.first().map(|i| i.url.clone()),
        title: details.name,
    }
}

fn fill_album(mut track: Track, details: &CollectionDetails) -> Track {
    if track.album_name.is_empty() {
        track.album_name = details.name.clone();
    }
    if track.cover_art.is_none() {
        track.cover_art = details.images.first().map(|i| i.url.clone());
    }
    track
}
