use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::{
    config,
    error::SessionError,
    identity::IdentityProvider,
    management::SessionStore,
    server,
    types::{AuthEvent, PkceExchangeRequest, PkceState, RefreshSessionRequest, Session},
    utils,
};

/// How long `sign_in` waits for the browser redirect.
const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(60);

/// Identity provider client for a Supabase (GoTrue) auth service.
///
/// Sign-in uses the PKCE flow: the browser is sent to the provider's
/// authorize endpoint, the local callback server receives the code, and the
/// code is exchanged together with the verifier for a session. The session
/// is persisted in a [`SessionStore`].
pub struct SupabaseAuth {
    http: Client,
    base_url: String,
    anon_key: String,
    redirect_uri: String,
    server_addr: String,
    store: SessionStore,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseAuth {
    pub fn new(base_url: String, anon_key: String, store: SessionStore) -> Self {
        let (events, _) = broadcast::channel(16);
        SupabaseAuth {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            redirect_uri: config::redirect_uri(),
            server_addr: config::server_addr(),
            store,
            events,
        }
    }

    pub fn from_env() -> Result<Self, SessionError> {
        Ok(Self::new(
            config::supabase_url()?,
            config::supabase_anon_key()?,
            SessionStore::default_location(),
        ))
    }

    pub fn with_redirect(mut self, server_addr: String, redirect_uri: String) -> Self {
        self.server_addr = server_addr;
        self.redirect_uri = redirect_uri;
        self
    }

    pub fn authorize_url(&self, provider: &str, scopes: &str, code_challenge: &str) -> String {
        let base = format!("{}/auth/v1/authorize", self.base_url);
        let params = [
            ("provider", provider),
            ("scopes", scopes),
            ("redirect_to", self.redirect_uri.as_str()),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "s256"),
        ];
        match Url::parse_with_params(&base, &params) {
            Ok(url) => url.to_string(),
            Err(_) => base,
        }
    }

    /// Exchanges a PKCE authorization code for a session.
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<Session, SessionError> {
        let res = self
            .http
            .post(format!("{}/auth/v1/token?grant_type=pkce", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&PkceExchangeRequest {
                auth_code: code,
                code_verifier: verifier,
            })
            .send()
            .await?;

        Self::session_from(res).await
    }

    async fn session_from(res: Response) -> Result<Session, SessionError> {
        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(SessionError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        Ok(res.json::<Session>().await?)
    }

    fn publish(&self, event: AuthEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }

    async fn wait_for_code(state: &Arc<Mutex<PkceState>>) -> Result<String, SessionError> {
        let start = std::time::Instant::now();

        while start.elapsed() < SIGN_IN_TIMEOUT {
            {
                let lock = state.lock().await;
                if let Some(code) = &lock.code {
                    return Ok(code.clone());
                }
                if let Some(error) = &lock.error {
                    return Err(SessionError::SignIn(error.clone()));
                }
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        Err(SessionError::SignIn("timed out waiting for the redirect".to_string()))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn sign_in(&self, provider: &str, scopes: &str) -> Result<Session, SessionError> {
        let code_verifier = utils::generate_code_verifier();
        let code_challenge = utils::generate_code_challenge(&code_verifier);

        let listener = server::bind(&self.server_addr).await.map_err(|e| {
            SessionError::SignIn(format!(
                "Cannot listen for the redirect on {}: {}",
                self.server_addr, e
            ))
        })?;

        let state = Arc::new(Mutex::new(PkceState::default()));
        let server_state = Arc::clone(&state);
        let callback = tokio::spawn(async move {
            if let Err(e) = server::serve(listener, server_state).await {
                warn!(error = %e, "Callback server stopped");
            }
        });

        let auth_url = self.authorize_url(provider, scopes, &code_challenge);
        debug!(url = %auth_url, "Opening authorization page");
        if webbrowser::open(&auth_url).is_err() {
            crate::warning!(
                "Failed to open browser. Please navigate to the following URL manually:\n{}",
                auth_url
            );
        }

        let code = Self::wait_for_code(&state).await;
        callback.abort();
        let session = self.exchange_code(&code?, &code_verifier).await?;

        self.store.persist(&session).await?;
        info!(
            user = session.user.as_ref().map(|u| u.id.as_str()).unwrap_or("unknown"),
            "Signed in"
        );
        self.publish(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), SessionError> {
        let stored = self.store.load().await.ok().flatten();
        self.store.clear().await?;
        self.publish(AuthEvent::SignedOut);

        let Some(session) = stored else {
            return Ok(());
        };

        let res = self
            .http
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let status = res.status();
        if status.is_success() {
            info!("Signed out");
            Ok(())
        } else {
            Err(SessionError::Provider {
                status: status.as_u16(),
                message: res.text().await.unwrap_or_default(),
            })
        }
    }

    async fn get_session(&self) -> Result<Option<Session>, SessionError> {
        self.store.load().await
    }

    async fn refresh_session(&self, current: &Session) -> Result<Session, SessionError> {
        debug!("Refreshing session");
        let res = self
            .http
            .post(format!(
                "{}/auth/v1/token?grant_type=refresh_token",
                self.base_url
            ))
            .header("apikey", &self.anon_key)
            .json(&RefreshSessionRequest {
                refresh_token: &current.refresh_token,
            })
            .send()
            .await?;

        let mut session = Self::session_from(res).await?;
        // refresh responses do not repeat the provider tokens
        if session.provider_token.is_none() {
            session.provider_token = current.provider_token.clone();
        }
        if session.provider_refresh_token.is_none() {
            session.provider_refresh_token = current.provider_refresh_token.clone();
        }

        self.store.persist(&session).await?;
        self.publish(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
