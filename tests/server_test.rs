use std::{sync::Arc, time::Duration};

use chipper::{server::start_api_server, types::PkceState};
use tokio::sync::Mutex;

async fn serve(addr: &'static str) -> (Arc<Mutex<PkceState>>, tokio::task::JoinHandle<()>) {
    let state = Arc::new(Mutex::new(PkceState::default()));
    let server_state = Arc::clone(&state);
    let task = tokio::spawn(async move {
        start_api_server(addr, server_state).await.unwrap();
    });

    // wait until the listener accepts connections
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    (state, task)
}

#[tokio::test]
async fn test_callback_stores_code() {
    let (state, server) = serve("127.0.0.1:38791").await;

    let body = reqwest::get("http://127.0.0.1:38791/callback?code=auth-code-1")
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("Authentication successful"));
    assert_eq!(state.lock().await.code.as_deref(), Some("auth-code-1"));
    server.abort();
}

#[tokio::test]
async fn test_callback_stores_provider_error() {
    let (state, server) = serve("127.0.0.1:38792").await;

    reqwest::get("http://127.0.0.1:38792/callback?error=access_denied&error_description=User+denied")
        .await
        .unwrap();

    let state = state.lock().await;
    assert_eq!(state.code, None);
    assert_eq!(state.error.as_deref(), Some("User denied"));
    server.abort();
}

#[tokio::test]
async fn test_health() {
    let (_state, server) = serve("127.0.0.1:38793").await;

    let health: serde_json::Value = reqwest::get("http://127.0.0.1:38793/health")
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], "chipper");
    server.abort();
}

#[tokio::test]
async fn test_invalid_address() {
    let state = Arc::new(Mutex::new(PkceState::default()));
    assert!(start_api_server("not-an-address", state).await.is_err());
}

#[tokio::test]
async fn test_bind_reports_a_taken_port() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap().to_string();

    assert!(matches!(
        chipper::server::bind(&addr).await,
        Err(chipper::error::SessionError::Store(_))
    ));
}
