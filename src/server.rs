use axum::{Extension, Router, routing::get};
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::Mutex};
use tracing::info;

use crate::{api, error::SessionError, types::PkceState};

pub fn router(state: Arc<Mutex<PkceState>>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback).layer(Extension(state)))
}

/// Binds the callback listener, failing when `addr` is malformed or taken.
pub async fn bind(addr: &str) -> Result<TcpListener, SessionError> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| SessionError::SignIn(format!("Failed to parse server address: {}", e)))?;

    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Callback server listening");
    Ok(listener)
}

/// Serves the callback router on a bound listener until the task is aborted.
pub async fn serve(listener: TcpListener, state: Arc<Mutex<PkceState>>) -> Result<(), SessionError> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Binds `addr` and serves the callback router on it.
pub async fn start_api_server(addr: &str, state: Arc<Mutex<PkceState>>) -> Result<(), SessionError> {
    serve(bind(addr).await?, state).await
}
