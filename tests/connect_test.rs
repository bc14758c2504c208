use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chipper::{
    error::PlaybackError,
    player::sdk::{PlayerFactory, PlayerOptions, PlayerSdk, SdkEvent, SdkEventReceiver},
    session::TokenSupplier,
    spotify::connect::ConnectPlayerFactory,
};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

struct StaticToken(Option<&'static str>);

#[async_trait]
impl TokenSupplier for StaticToken {
    async fn token(&self) -> Option<String> {
        self.0.map(str::to_string)
    }
}

fn player(base_url: String, token: Option<&'static str>) -> (Arc<dyn PlayerSdk>, SdkEventReceiver) {
    let factory = ConnectPlayerFactory::new(base_url, Duration::from_millis(10));
    let (events_tx, events) = mpsc::unbounded_channel();
    let player = factory.create(
        PlayerOptions {
            name: "Chipper".to_string(),
            volume: 0.5,
            tokens: Arc::new(StaticToken(token)),
        },
        events_tx,
    );
    (player, events)
}

async fn next_event(events: &mut SdkEventReceiver) -> SdkEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("no player event within 2s")
        .expect("event channel closed")
}

/// Events that arrive within `window`.
async fn drain(events: &mut SdkEventReceiver, window: Duration) -> Vec<SdkEvent> {
    let mut seen = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(window, events.recv()).await {
        seen.push(event);
    }
    seen
}

fn devices_json(ids: &[&str]) -> serde_json::Value {
    let devices: Vec<_> = ids
        .iter()
        .map(|id| {
            let name = if *id == "desk" { "Chipper" } else { "Pixel" };
            json!({ "id": id, "name": name })
        })
        .collect();
    json!({ "devices": devices })
}

fn playing_json(device: &str, track: &str, is_playing: bool, progress_ms: u64) -> serde_json::Value {
    json!({
        "device": { "id": device, "name": "Chipper", "is_active": true },
        "is_playing": is_playing,
        "progress_ms": progress_ms,
        "item": {
            "name": track,
            "uri": format!("spotify:track:{}", track),
            "duration_ms": 180_000,
            "artists": [{ "name": "Renzo Sy" }]
        }
    })
}

fn state_uri(event: &SdkEvent) -> Option<(String, bool)> {
    match event {
        SdkEvent::PlayerStateChanged(Some(state)) => state
            .track_window
            .current_track
            .as_ref()
            .map(|t| (t.uri.clone(), state.paused)),
        _ => None,
    }
}

async fn mount_desk(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_json(&["desk"])))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/me/player/volume"))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_connect_player_announces_device() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [
                { "id": "phone", "name": "Pixel", "is_active": true },
                { "id": "desk", "name": "Chipper", "is_active": false }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/me/player/volume"))
        .and(query_param("device_id", "desk"))
        .and(query_param("volume_percent", "50"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (player, mut events) = player(server.uri(), Some("spotify-token"));
    assert!(player.connect().await);

    assert_eq!(
        next_event(&mut events).await,
        SdkEvent::Ready {
            device_id: "desk".to_string()
        }
    );
    // Nothing loaded on the device
    assert_eq!(
        next_event(&mut events).await,
        SdkEvent::PlayerStateChanged(None)
    );

    player.disconnect().await;
    assert!(matches!(player.pause().await, Err(PlaybackError::NotReady)));
}

#[tokio::test]
async fn test_connect_player_needs_a_token() {
    let (player, _events) = player("http://127.0.0.1:9".to_string(), None);
    assert!(!player.connect().await);
}

#[tokio::test]
async fn test_vanished_device_stops_the_watcher() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_json(&["desk"])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_json(&["phone"])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/me/player/volume"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (player, mut events) = player(server.uri(), Some("spotify-token"));
    assert!(player.connect().await);

    assert_eq!(
        next_event(&mut events).await,
        SdkEvent::Ready {
            device_id: "desk".to_string()
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        SdkEvent::PlayerStateChanged(None)
    );
    assert_eq!(
        next_event(&mut events).await,
        SdkEvent::NotReady {
            device_id: "desk".to_string()
        }
    );

    // The watcher is done and commands have no device
    assert!(drain(&mut events, Duration::from_millis(100)).await.is_empty());
    assert!(matches!(player.pause().await, Err(PlaybackError::NotReady)));
}

#[tokio::test]
async fn test_state_events_only_on_track_or_pause_change() {
    let server = MockServer::start().await;
    mount_desk(&server).await;
    let samples = [
        playing_json("desk", "a", true, 1_000),
        // position only
        playing_json("desk", "a", true, 2_000),
        playing_json("desk", "a", false, 2_000),
    ];
    for sample in samples {
        Mock::given(method("GET"))
            .and(path("/me/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample))
            .up_to_n_times(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_json(playing_json("desk", "b", true, 0)))
        .mount(&server)
        .await;

    let (player, mut events) = player(server.uri(), Some("spotify-token"));
    assert!(player.connect().await);
    assert!(matches!(next_event(&mut events).await, SdkEvent::Ready { .. }));

    let changes: Vec<_> = drain(&mut events, Duration::from_millis(200))
        .await
        .iter()
        .map(state_uri)
        .collect();
    assert_eq!(
        changes,
        vec![
            Some(("spotify:track:a".to_string(), false)),
            Some(("spotify:track:a".to_string(), true)),
            Some(("spotify:track:b".to_string(), false)),
        ]
    );

    player.disconnect().await;
}

#[tokio::test]
async fn test_playback_on_another_device_is_nothing_loaded() {
    let server = MockServer::start().await;
    mount_desk(&server).await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_json(playing_json("desk", "a", true, 0)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_json(playing_json("phone", "a", true, 5_000)))
        .mount(&server)
        .await;

    let (player, mut events) = player(server.uri(), Some("spotify-token"));
    assert!(player.connect().await);
    assert!(matches!(next_event(&mut events).await, SdkEvent::Ready { .. }));

    assert_eq!(
        state_uri(&next_event(&mut events).await),
        Some(("spotify:track:a".to_string(), false))
    );
    assert_eq!(
        next_event(&mut events).await,
        SdkEvent::PlayerStateChanged(None)
    );
    assert_eq!(player.get_current_state().await, None);

    player.disconnect().await;
}

#[tokio::test]
async fn test_rejections_become_sdk_error_events() {
    let server = MockServer::start().await;
    mount_desk(&server).await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "status": 401, "message": "The access token expired" }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "status": 403, "message": "Premium required", "reason": "PREMIUM_REQUIRED" }
        })))
        .mount(&server)
        .await;

    let (player, mut events) = player(server.uri(), Some("spotify-token"));
    assert!(player.connect().await);
    assert!(matches!(next_event(&mut events).await, SdkEvent::Ready { .. }));

    assert_eq!(
        next_event(&mut events).await,
        SdkEvent::AuthenticationError {
            message: "The access token expired".to_string()
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        SdkEvent::AccountError {
            message: "Premium required".to_string()
        }
    );

    player.disconnect().await;
}
