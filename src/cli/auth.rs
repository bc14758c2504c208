use crate::{
    config, error,
    error::CatalogError,
    identity::{IdentityProvider, SPOTIFY_PROVIDER, SupabaseAuth},
    info,
    spotify::catalog::CatalogClient,
    success, warning,
};

pub async fn login() {
    let auth = match SupabaseAuth::from_env() {
        Ok(auth) => auth,
        Err(e) => error!("Cannot set up the identity provider. Err: {}", e),
    };

    info!("Opening Spotify sign-in in your browser...");
    match auth.sign_in(SPOTIFY_PROVIDER, &config::spotify_scopes()).await {
        Ok(session) => {
            let who = session
                .user
                .as_ref()
                .map(|u| u.email.clone().unwrap_or_else(|| u.id.clone()))
                .unwrap_or_else(|| "unknown user".to_string());
            success!("Signed in as {}", who);
        }
        Err(e) => error!("Sign-in failed. Err: {}", e),
    }
}

pub async fn logout() {
    let auth = match SupabaseAuth::from_env() {
        Ok(auth) => auth,
        Err(e) => error!("Cannot set up the identity provider. Err: {}", e),
    };

    match auth.sign_out().await {
        Ok(()) => success!("Signed out"),
        // the local session is gone either way
        Err(e) => warning!("Signed out locally, provider sign-out failed: {}", e),
    }
}

pub async fn whoami() {
    let Some(session) = super::require_session().await else {
        return;
    };

    let catalog = CatalogClient::from_env(session);
    match catalog.profile().await {
        Ok(profile) => {
            info!(
                "{} ({})",
                profile.display_name.unwrap_or_else(|| profile.id.clone()),
                profile.id
            );
            if let Some(email) = profile.email {
                info!("Email: {}", email);
            }
            if let Some(product) = profile.product {
                info!("Plan: {}", product);
            }
            if let Some(country) = profile.country {
                info!("Country: {}", country);
            }
        }
        Err(CatalogError::AccessDenied(_)) => super::access_denied_notice(),
        Err(CatalogError::NoToken | CatalogError::Unauthorized(_)) => super::signed_out_notice(),
        Err(e) => warning!("Failed to load profile: {}", e),
    }
}
