use std::{collections::HashMap, sync::Arc};

use axum::{Extension, extract::Query, response::Html};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::types::PkceState;

pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(shared_state): Extension<Arc<Mutex<PkceState>>>,
) -> Html<&'static str> {
    let mut state = shared_state.lock().await;

    if let Some(code) = params.get("code") {
        debug!("Received authorization code");
        state.code = Some(code.clone());
        return Html("<h2>Authentication successful.</h2><p>Close this browser window.</p>");
    }

    let reason = params
        .get("error_description")
        .or_else(|| params.get("error"))
        .cloned()
        .unwrap_or_else(|| "missing authorization code".to_string());
    warn!(reason = %reason, "Sign-in callback without code");
    state.error = Some(reason);
    Html("<h4>Login failed.</h4>")
}
