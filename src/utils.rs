use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::types::{Collection, Session, Track, TrackTableRow};

pub fn generate_code_verifier() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(128)
        .map(char::from)
        .collect()
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Reads the `exp` claim (unix seconds) from a JWT without verifying it.
pub fn jwt_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice::<ExpiryClaim>(&bytes)
        .ok()
        .map(|claim| claim.exp)
}

/// Expiry of the session's access token: the JWT claim, else `expires_at`.
pub fn session_expiry(session: &Session) -> Option<i64> {
    jwt_expiry(&session.access_token).or(session.expires_at)
}

/// Formats whole seconds as `m:ss`.
pub fn format_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub fn format_duration_ms(ms: u64) -> String {
    format_time(ms / 1000)
}

pub fn parse_collection(s: &str) -> Result<Collection, String> {
    s.parse()
}

pub fn track_table_rows(tracks: &[Track]) -> Vec<TrackTableRow> {
    tracks
        .iter()
        .enumerate()
        .map(|(i, t)| TrackTableRow {
            index: i + 1,
            track: t.name.clone(),
            album: t.album_name.clone(),
            artist: t.artist_name.clone(),
            duration: format_duration_ms(t.duration_ms),
        })
        .collect()
}
