#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chipper::types::{Session, SessionUser};
use chrono::Utc;

/// Unsigned JWT whose payload carries `exp`.
pub fn jwt_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user-1","exp":{}}}"#, exp));
    format!("{}.{}.signature", header, payload)
}

/// Session whose access token expires `secs` from now.
pub fn session_expiring_in(secs: i64, provider_token: &str) -> Session {
    Session {
        access_token: jwt_with_exp(Utc::now().timestamp() + secs),
        token_type: "bearer".to_string(),
        expires_in: secs,
        expires_at: None,
        refresh_token: "refresh-1".to_string(),
        provider_token: Some(provider_token.to_string()),
        provider_refresh_token: Some("spotify-refresh".to_string()),
        user: Some(SessionUser {
            id: "user-1".to_string(),
            email: Some("listener@example.com".to_string()),
        }),
    }
}
