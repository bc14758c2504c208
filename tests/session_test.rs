mod common;

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chipper::{
    error::SessionError,
    identity::{IdentityProvider, SupabaseAuth},
    management::SessionStore,
    session::{SessionCoordinator, needs_refresh},
    types::{AuthEvent, Session},
};
use chrono::Utc;
use tokio::sync::broadcast;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

// In-memory identity provider counting refresh calls
struct FakeProvider {
    stored: Mutex<Option<Session>>,
    refresh_result: Mutex<Option<Session>>,
    refresh_calls: AtomicUsize,
    events: broadcast::Sender<AuthEvent>,
}

impl FakeProvider {
    fn new(stored: Option<Session>) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(FakeProvider {
            stored: Mutex::new(stored),
            refresh_result: Mutex::new(None),
            refresh_calls: AtomicUsize::new(0),
            events,
        })
    }

    fn refresh_to(&self, session: Session) {
        *self.refresh_result.lock().unwrap() = Some(session);
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn push(&self, event: AuthEvent) {
        self.events.send(event).unwrap();
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn sign_in(&self, _provider: &str, _scopes: &str) -> Result<Session, SessionError> {
        Err(SessionError::SignIn("not supported".to_string()))
    }

    async fn sign_out(&self) -> Result<(), SessionError> {
        *self.stored.lock().unwrap() = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn refresh_session(&self, _current: &Session) -> Result<Session, SessionError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        // give concurrent callers a chance to pile up
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.refresh_result
            .lock()
            .unwrap()
            .clone()
            .ok_or(SessionError::Provider {
                status: 400,
                message: "invalid refresh token".to_string(),
            })
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

async fn coordinator(provider: &Arc<FakeProvider>) -> Arc<SessionCoordinator> {
    let dyn_provider: Arc<dyn IdentityProvider> = provider.clone();
    let coordinator = SessionCoordinator::new(dyn_provider);
    coordinator.load().await;
    coordinator
}

#[test]
fn test_needs_refresh_threshold() {
    let now = Utc::now().timestamp();

    assert!(needs_refresh(&common::session_expiring_in(30, "t"), now));
    assert!(!needs_refresh(&common::session_expiring_in(120, "t"), now));

    // Unreadable expiry counts as expired
    let mut opaque = common::session_expiring_in(120, "t");
    opaque.access_token = "opaque".to_string();
    assert!(needs_refresh(&opaque, now));
}

#[tokio::test]
async fn test_get_token_reads_cache_without_refreshing() {
    let provider = FakeProvider::new(Some(common::session_expiring_in(30, "cached-token")));
    let coordinator = coordinator(&provider).await;

    assert_eq!(coordinator.get_token(), Some("cached-token".to_string()));
    assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn test_ensure_fresh_refreshes_expiring_session_once() {
    let provider = FakeProvider::new(Some(common::session_expiring_in(30, "old-token")));
    provider.refresh_to(common::session_expiring_in(3600, "new-token"));
    let coordinator = coordinator(&provider).await;

    assert_eq!(coordinator.ensure_fresh().await, Some("new-token".to_string()));
    assert_eq!(provider.refresh_calls(), 1);

    // The refreshed session is cached
    assert_eq!(coordinator.get_token(), Some("new-token".to_string()));
    assert_eq!(coordinator.ensure_fresh().await, Some("new-token".to_string()));
    assert_eq!(provider.refresh_calls(), 1);
}

#[tokio::test]
async fn test_ensure_fresh_keeps_valid_session() {
    let provider = FakeProvider::new(Some(common::session_expiring_in(120, "valid-token")));
    let coordinator = coordinator(&provider).await;

    assert_eq!(coordinator.ensure_fresh().await, Some("valid-token".to_string()));
    assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn test_ensure_fresh_without_session() {
    let provider = FakeProvider::new(None);
    let coordinator = coordinator(&provider).await;

    assert_eq!(coordinator.ensure_fresh().await, None);
    assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn test_failed_refresh_yields_no_token() {
    let provider = FakeProvider::new(Some(common::session_expiring_in(10, "old-token")));
    let coordinator = coordinator(&provider).await;

    assert_eq!(coordinator.ensure_fresh().await, None);
    assert_eq!(provider.refresh_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let provider = FakeProvider::new(Some(common::session_expiring_in(5, "old-token")));
    provider.refresh_to(common::session_expiring_in(3600, "new-token"));
    let coordinator = coordinator(&provider).await;

    let (a, b) = tokio::join!(coordinator.ensure_fresh(), coordinator.ensure_fresh());

    assert_eq!(a, Some("new-token".to_string()));
    assert_eq!(b, Some("new-token".to_string()));
    assert_eq!(provider.refresh_calls(), 1);
}

#[tokio::test]
async fn test_subscription_mirrors_session_events() {
    let provider = FakeProvider::new(None);
    let coordinator = coordinator(&provider).await;
    let _subscription = coordinator.subscribe().unwrap();
    let mut changes = coordinator.watch();

    provider.push(AuthEvent::SignedIn(common::session_expiring_in(3600, "signed-in")));
    tokio::time::timeout(Duration::from_secs(1), changes.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coordinator.get_token(), Some("signed-in".to_string()));

    provider.push(AuthEvent::TokenRefreshed(common::session_expiring_in(3600, "rotated")));
    tokio::time::timeout(Duration::from_secs(1), changes.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coordinator.get_token(), Some("rotated".to_string()));

    provider.sign_out().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), changes.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coordinator.get_token(), None);
    assert_eq!(coordinator.ensure_fresh().await, None);
}

#[tokio::test]
async fn test_only_one_live_subscription() {
    let provider = FakeProvider::new(None);
    let coordinator = coordinator(&provider).await;

    let first = coordinator.subscribe().unwrap();
    assert!(matches!(
        coordinator.subscribe(),
        Err(SessionError::AlreadySubscribed)
    ));

    first.unsubscribe();
    assert!(coordinator.subscribe().is_ok());
}

#[tokio::test]
async fn test_dropped_subscription_stops_updates() {
    let provider = FakeProvider::new(Some(common::session_expiring_in(3600, "kept")));
    let coordinator = coordinator(&provider).await;

    let subscription = coordinator.subscribe().unwrap();
    drop(subscription);
    tokio::task::yield_now().await;

    let _ = provider.events.send(AuthEvent::SignedOut);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(coordinator.get_token(), Some("kept".to_string()));
}

#[tokio::test]
async fn test_session_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("cache/session.json"));

    // Nothing stored yet
    assert_eq!(store.load().await.unwrap(), None);

    let session = common::session_expiring_in(3600, "stored-token");
    store.persist(&session).await.unwrap();
    assert_eq!(store.load().await.unwrap(), Some(session));

    store.clear().await.unwrap();
    assert_eq!(store.load().await.unwrap(), None);

    // Clearing twice is fine
    store.clear().await.unwrap();
}

#[tokio::test]
async fn test_malformed_session_store() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    std::fs::write(&file, "not json").unwrap();

    let store = SessionStore::new(file);
    assert!(matches!(store.load().await, Err(SessionError::Serde(_))));
}

#[tokio::test]
async fn test_supabase_refresh_keeps_provider_tokens() {
    let server = MockServer::start().await;
    let fresh_access = common::jwt_with_exp(Utc::now().timestamp() + 3600);

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(header("apikey", "anon-key"))
        .and(body_json(serde_json::json!({ "refresh_token": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": fresh_access,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("session.json");
    let auth = SupabaseAuth::new(
        server.uri(),
        "anon-key".to_string(),
        SessionStore::new(store_path.clone()),
    );
    let mut events = auth.subscribe();

    let current = common::session_expiring_in(10, "spotify-token");
    let refreshed = auth.refresh_session(&current).await.unwrap();

    assert_eq!(refreshed.refresh_token, "refresh-2");
    assert_eq!(refreshed.provider_token, Some("spotify-token".to_string()));
    assert_eq!(
        refreshed.provider_refresh_token,
        Some("spotify-refresh".to_string())
    );

    // Persisted and announced
    let stored = SessionStore::new(store_path).load().await.unwrap();
    assert_eq!(stored, Some(refreshed.clone()));
    assert_eq!(events.recv().await.unwrap(), AuthEvent::TokenRefreshed(refreshed));
}

#[tokio::test]
async fn test_supabase_refresh_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = SupabaseAuth::new(
        server.uri(),
        "anon-key".to_string(),
        SessionStore::new(dir.path().join("session.json")),
    );

    let result = auth
        .refresh_session(&common::session_expiring_in(10, "spotify-token"))
        .await;
    assert!(matches!(
        result,
        Err(SessionError::Provider { status: 400, .. })
    ));
}

#[tokio::test]
async fn test_supabase_sign_out_clears_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("apikey", "anon-key"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("session.json");
    let store = SessionStore::new(store_path.clone());
    store
        .persist(&common::session_expiring_in(3600, "spotify-token"))
        .await
        .unwrap();

    let auth = SupabaseAuth::new(server.uri(), "anon-key".to_string(), store);
    let mut events = auth.subscribe();

    auth.sign_out().await.unwrap();

    assert_eq!(auth.get_session().await.unwrap(), None);
    assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
}

#[test]
fn test_authorize_url() {
    let auth = SupabaseAuth::new(
        "https://project.supabase.co/".to_string(),
        "anon-key".to_string(),
        SessionStore::new("unused.json".into()),
    )
    .with_redirect(
        "127.0.0.1:8787".to_string(),
        "http://127.0.0.1:8787/callback".to_string(),
    );

    let url = auth.authorize_url("spotify", "streaming user-read-email", "challenge");

    assert!(url.starts_with("https://project.supabase.co/auth/v1/authorize?"));
    assert!(url.contains("provider=spotify"));
    assert!(url.contains("scopes=streaming+user-read-email"));
    assert!(url.contains("redirect_to=http%3A%2F%2F127.0.0.1%3A8787%2Fcallback"));
    assert!(url.contains("code_challenge=challenge"));
    assert!(url.contains("code_challenge_method=s256"));
}

#[tokio::test]
async fn test_renew_refreshes_a_rejected_token() {
    // Not yet near expiry, so ensure_fresh alone would keep it
    let provider = FakeProvider::new(Some(common::session_expiring_in(3600, "rejected-token")));
    provider.refresh_to(common::session_expiring_in(3600, "renewed-token"));
    let coordinator = coordinator(&provider).await;

    assert_eq!(
        coordinator.renew("rejected-token").await,
        Some("renewed-token".to_string())
    );
    assert_eq!(provider.refresh_calls(), 1);
    assert_eq!(coordinator.get_token(), Some("renewed-token".to_string()));
}

#[tokio::test]
async fn test_renew_skips_refresh_when_token_already_rotated() {
    let provider = FakeProvider::new(Some(common::session_expiring_in(3600, "current-token")));
    let coordinator = coordinator(&provider).await;

    assert_eq!(
        coordinator.renew("older-token").await,
        Some("current-token".to_string())
    );
    assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn test_renew_without_session() {
    let provider = FakeProvider::new(None);
    let coordinator = coordinator(&provider).await;

    assert_eq!(coordinator.renew("any-token").await, None);
    assert_eq!(provider.refresh_calls(), 0);
}

#[tokio::test]
async fn test_sign_in_fails_fast_when_callback_port_is_taken() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap().to_string();

    let dir = tempfile::tempdir().unwrap();
    let auth = SupabaseAuth::new(
        "http://127.0.0.1:9".to_string(),
        "anon-key".to_string(),
        SessionStore::new(dir.path().join("session.json")),
    )
    .with_redirect(addr.clone(), format!("http://{}/callback", addr));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        auth.sign_in("spotify", "streaming"),
    )
    .await
    .expect("sign_in waited for a redirect it could never receive");

    assert!(matches!(result, Err(SessionError::SignIn(_))));
    drop(taken);
}
