//! # Session coordinator
//!
//! Keeps one cached copy of the identity provider's session and hands out
//! the delegated Spotify token to the catalog client, the playback endpoint
//! and the player SDK.
//!
//! The cache lives in a `watch` channel: reads are cheap and never block,
//! and components that need to react to a login or logout can hold a
//! receiver. Writes happen after a successful refresh, in
//! [`SessionCoordinator::ensure_fresh`] or [`SessionCoordinator::renew`], and
//! in the subscription task that mirrors the provider's [`AuthEvent`]s.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::{
    sync::{Mutex, broadcast::error::RecvError, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::SessionError,
    identity::IdentityProvider,
    types::{AuthEvent, Session},
    utils,
};

/// Sessions with less validity than this are refreshed.
pub const REFRESH_THRESHOLD_SECS: i64 = 60;

/// Pull-based token source, asked every time a token is needed.
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    async fn token(&self) -> Option<String>;

    /// Asked once after the API rejected `rejected`. Returns the token to
    /// retry with; the default has nothing better than [`Self::token`].
    async fn renew(&self, rejected: &str) -> Option<String> {
        let _ = rejected;
        self.token().await
    }
}

pub struct SessionCoordinator {
    provider: Arc<dyn IdentityProvider>,
    session: watch::Sender<Option<Session>>,
    refresh_lock: Mutex<()>,
    subscribed: AtomicBool,
}

impl SessionCoordinator {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Arc<Self> {
        let (session, _) = watch::channel(None);
        Arc::new(SessionCoordinator {
            provider,
            session,
            refresh_lock: Mutex::new(()),
            subscribed: AtomicBool::new(false),
        })
    }

    /// Primes the cache from the provider's stored session.
    pub async fn load(&self) -> Option<Session> {
        match self.provider.get_session().await {
            Ok(session) => {
                self.session.send_replace(session.clone());
                session
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                None
            }
        }
    }

    /// Delegated provider token of the cached session.
    pub fn get_token(&self) -> Option<String> {
        self.session
            .borrow()
            .as_ref()
            .and_then(|s| s.provider_token.clone())
    }

    pub fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    /// Refreshes the session when it expires within [`REFRESH_THRESHOLD_SECS`]
    /// and returns the delegated token, or `None` when no usable token exists.
    pub async fn ensure_fresh(&self) -> Option<String> {
        let _guard = self.refresh_lock.lock().await;

        let session = self.session.borrow().clone()?;
        if !needs_refresh(&session, Utc::now().timestamp()) {
            return session.provider_token;
        }

        debug!("Session expires soon, refreshing");
        self.refresh(&session).await
    }

    /// Refreshes the session after the catalog or playback API rejected
    /// `rejected`, whatever its expiry claims.
    ///
    /// Callers that were rejected with a token which has since been
    /// replaced get the current token without another refresh.
    pub async fn renew(&self, rejected: &str) -> Option<String> {
        let _guard = self.refresh_lock.lock().await;

        let session = self.session.borrow().clone()?;
        if session.provider_token.as_deref() != Some(rejected) {
            return session.provider_token;
        }

        debug!("Token rejected, refreshing session");
        self.refresh(&session).await
    }

    /// Caller holds `refresh_lock`.
    async fn refresh(&self, session: &Session) -> Option<String> {
        match self.provider.refresh_session(session).await {
            Ok(fresh) => {
                let token = fresh.provider_token.clone();
                self.session.send_replace(Some(fresh));
                token
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh session");
                None
            }
        }
    }

    /// Mirrors the provider's session events into the cache until the
    /// returned guard is dropped. Only one subscription may be live.
    pub fn subscribe(self: &Arc<Self>) -> Result<SessionSubscription, SessionError> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadySubscribed);
        }

        let mut events = self.provider.subscribe();
        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => coordinator.apply(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed session events, reloading session");
                        coordinator.load().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(SessionSubscription {
            task,
            coordinator: Arc::clone(self),
        })
    }

    fn apply(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) => {
                info!("Session signed in");
                self.session.send_replace(Some(session));
            }
            AuthEvent::TokenRefreshed(session) => {
                debug!("Session token rotated");
                self.session.send_replace(Some(session));
            }
            AuthEvent::SignedOut => {
                info!("Session signed out");
                self.session.send_replace(None);
            }
        }
    }
}

#[async_trait]
impl TokenSupplier for SessionCoordinator {
    async fn token(&self) -> Option<String> {
        self.ensure_fresh().await
    }

    async fn renew(&self, rejected: &str) -> Option<String> {
        SessionCoordinator::renew(self, rejected).await
    }
}

/// Whether `session` has less than [`REFRESH_THRESHOLD_SECS`] left at `now`.
pub fn needs_refresh(session: &Session, now: i64) -> bool {
    match utils::session_expiry(session) {
        Some(exp) => exp - now < REFRESH_THRESHOLD_SECS,
        None => true,
    }
}

/// Live subscription to session events; unsubscribes on drop.
pub struct SessionSubscription {
    task: JoinHandle<()>,
    coordinator: Arc<SessionCoordinator>,
}

impl SessionSubscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.task.abort();
        self.coordinator.subscribed.store(false, Ordering::SeqCst);
    }
}
