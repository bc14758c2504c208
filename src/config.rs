//! Configuration management for the showcase.
//!
//! Values come from environment variables, optionally loaded from a `.env`
//! file in the local data directory. Optional settings fall back to the
//! defaults below; the identity provider settings are required for anything
//! that needs a session.
//!
//! The configuration follows a simple precedence:
//! 1. Environment variables of the process (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults, where a setting has one
//!
//! Empty or whitespace-only values count as unset.

use std::{env, path::PathBuf};

use crate::{error::ConfigError, types::Collection};

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8787";
pub const DEFAULT_SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SPOTIFY_SCOPES: &str = "streaming user-read-email user-read-private user-modify-playback-state user-read-playback-state";
pub const DEFAULT_MARKET: &str = "US";
pub const DEFAULT_DEVICE_NAME: &str = "Chipper";
pub const DEFAULT_VOLUME: f32 = 0.5;

/// Returns the application's directory inside the platform data dir.
///
/// Falls back to `./chipper` when the platform has no local data directory.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("chipper");
    path
}

/// Loads environment variables from the `.env` file in [`data_dir`].
///
/// Creates the directory if needed. A missing file is not an error, the
/// process environment is used as is. Variables already set in the process
/// are not overwritten.
///
/// # Directory Structure
///
/// The function looks for the `.env` file in:
/// - Linux: `~/.local/share/chipper/.env`
/// - macOS: `~/Library/Application Support/chipper/.env`
/// - Windows: `%LOCALAPPDATA%/chipper/.env`
///
/// # Errors
///
/// Returns an error string if:
/// - The data directory cannot be created
/// - The `.env` file exists but cannot be read or parsed
///
/// # Example
///
/// ```
/// use chipper::config;
///
/// #[tokio::main]
/// async fn main() {
///     if let Err(e) = config::load_env().await {
///         eprintln!("Configuration error: {}", e);
///     }
/// }
/// ```
pub async fn load_env() -> Result<(), String> {
    let dir = data_dir();
    async_fs::create_dir_all(&dir)
        .await
        .map_err(|e| e.to_string())?;

    let path = dir.join(".env");
    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

/// Returns the base URL of the identity provider.
///
/// Reads `SUPABASE_URL`. A trailing slash is removed.
///
/// # Errors
///
/// Returns [`ConfigError::Missing`] when the variable is not set.
///
/// # Example
///
/// ```
/// let url = supabase_url()?; // e.g., "https://xyz.supabase.co"
/// ```
pub fn supabase_url() -> Result<String, ConfigError> {
    required("SUPABASE_URL").map(|url| url.trim_end_matches('/').to_string())
}

/// Returns the public anon key of the identity provider.
///
/// Reads `SUPABASE_ANON_KEY`. The key is sent as the `apikey` header with
/// every identity provider request.
///
/// # Errors
///
/// Returns [`ConfigError::Missing`] when the variable is not set.
pub fn supabase_anon_key() -> Result<String, ConfigError> {
    required("SUPABASE_ANON_KEY")
}

/// Returns the address of the local callback server.
///
/// Reads `SERVER_ADDRESS`, which is where the sign-in flow listens for the
/// identity provider's redirect. Defaults to [`DEFAULT_SERVER_ADDRESS`].
///
/// # Example
///
/// ```
/// let addr = server_addr(); // e.g., "127.0.0.1:8787"
/// ```
pub fn server_addr() -> String {
    optional("SERVER_ADDRESS").unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string())
}

/// Returns the URI the identity provider redirects to after authorization.
///
/// Reads `AUTH_REDIRECT_URI`, else derives `http://<server_addr>/callback`
/// from [`server_addr`]. The URI must be allow-listed in the identity
/// provider's redirect settings.
///
/// # Example
///
/// ```
/// let uri = redirect_uri(); // e.g., "http://127.0.0.1:8787/callback"
/// ```
pub fn redirect_uri() -> String {
    optional("AUTH_REDIRECT_URI").unwrap_or_else(|| format!("http://{}/callback", server_addr()))
}

/// Returns the Spotify scopes requested at sign-in, space separated.
///
/// Reads `SPOTIFY_SCOPES`. The default covers streaming, profile reads and
/// playback control.
pub fn spotify_scopes() -> String {
    optional("SPOTIFY_SCOPES").unwrap_or_else(|| DEFAULT_SPOTIFY_SCOPES.to_string())
}

/// Returns the Spotify Web API base URL.
///
/// Reads `SPOTIFY_API_URL`, mostly useful to point the client at a test
/// server. A trailing slash is removed.
///
/// # Example
///
/// ```
/// let api = spotify_apiurl(); // e.g., "https://api.spotify.com/v1"
/// ```
pub fn spotify_apiurl() -> String {
    optional("SPOTIFY_API_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_SPOTIFY_API_URL.to_string())
}

/// Market used for top-track lookups.
pub fn market() -> String {
    optional("SPOTIFY_MARKET").unwrap_or_else(|| DEFAULT_MARKET.to_string())
}

/// Name of the Spotify Connect device the player attaches to.
pub fn device_name() -> String {
    optional("PLAYER_DEVICE_NAME").unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string())
}

/// Returns the initial player volume.
///
/// Reads `PLAYER_VOLUME` as a number between 0.0 and 1.0. Defaults to
/// [`DEFAULT_VOLUME`].
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the value is not a number or lies
/// outside 0.0 to 1.0.
///
/// # Example
///
/// ```
/// // PLAYER_VOLUME=0.8
/// assert_eq!(player_volume()?, 0.8);
/// ```
pub fn player_volume() -> Result<f32, ConfigError> {
    match optional("PLAYER_VOLUME") {
        None => Ok(DEFAULT_VOLUME),
        Some(value) => match value.parse::<f32>() {
            Ok(v) if (0.0..=1.0).contains(&v) => Ok(v),
            _ => Err(ConfigError::Invalid {
                key: "PLAYER_VOLUME",
                value,
            }),
        },
    }
}

/// Returns the curated collections of the showcase.
///
/// Reads `SHOWCASE_COLLECTIONS`, a comma separated list of collection keys
/// in the form `top:<artist>`, `album:<id>` or `playlist:<id>`. Blank
/// entries are skipped and an unset variable yields no collections.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming the first entry that is not a
/// valid collection key.
///
/// # Example
///
/// ```
/// // SHOWCASE_COLLECTIONS="top:Renzo Sy, album:4aawyAB9vmqN3uQ7FjRGTy"
/// let collections = showcase_collections()?;
/// assert_eq!(collections.len(), 2);
/// ```
pub fn showcase_collections() -> Result<Vec<Collection>, ConfigError> {
    let Some(raw) = optional("SHOWCASE_COLLECTIONS") else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Collection>().map_err(|_| ConfigError::Invalid {
                key: "SHOWCASE_COLLECTIONS",
                value: s.to_string(),
            })
        })
        .collect()
}

/// Contact listeners are pointed to when they need to request access.
pub fn access_contact() -> Option<String> {
    optional("SHOWCASE_CONTACT")
}
