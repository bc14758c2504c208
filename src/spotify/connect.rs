//! Spotify Connect device driven through the Web API, exposed as a
//! [`PlayerSdk`].
//!
//! `connect` starts a watcher task that first looks for the configured
//! device (by name, else the active one, else the first listed) and
//! announces it with a ready event. It then samples `/me/player` on every
//! tick and emits a state event whenever the loaded track or the paused
//! flag changes. The device list is re-checked periodically; a vanished
//! device ends the watcher with a not-ready event.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, header::CONTENT_LENGTH};
use serde::Deserialize;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    config,
    error::PlaybackError,
    player::sdk::{
        PlayerFactory, PlayerOptions, PlayerSdk, SdkEvent, SdkEventSender, SdkPlaybackState,
        SdkTrack, TrackWindow,
    },
    session::TokenSupplier,
    spotify::playback_error,
    types::CatalogTrack,
};

/// Time between two `/me/player` samples.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Ticks between two device list checks.
const DEVICE_CHECK_TICKS: u32 = 5;

/// One entry of `GET /me/player/devices`.
///
/// Restricted devices come without an id and cannot be controlled.
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Deserialize)]
struct CurrentPlayback {
    #[serde(default)]
    device: Option<Device>,
    #[serde(default)]
    is_playing: bool,
    #[serde(default)]
    progress_ms: Option<u64>,
    #[serde(default)]
    item: Option<CatalogTrack>,
}

impl CurrentPlayback {
    fn into_state(self) -> SdkPlaybackState {
        let duration = self.item.as_ref().map(|t| t.duration_ms).unwrap_or(0);
        SdkPlaybackState {
            paused: !self.is_playing,
            position: self.progress_ms.unwrap_or(0),
            duration,
            track_window: TrackWindow {
                current_track: self.item.map(|t| SdkTrack {
                    uri: t.uri,
                    name: t.name,
                    artists: t.artists,
                    album: t.album.unwrap_or_default(),
                }),
            },
        }
    }
}

/// Picks the device to attach to.
///
/// Devices without an id are never chosen.
///
/// # Arguments
///
/// * `devices` - The account's devices as listed by the Web API
/// * `name` - Preferred device name, compared case-insensitively
///
/// # Returns
///
/// The id of the device named `name`, else of the active device, else of
/// the first listed device. `None` when no device has an id.
///
/// # Example
///
/// ```
/// let id = choose_device(&devices, "Chipper"); // e.g., Some("0d1841b0...")
/// ```
pub fn choose_device(devices: &[Device], name: &str) -> Option<String> {
    let usable = || devices.iter().filter(|d| d.id.is_some());
    usable()
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .or_else(|| usable().find(|d| d.is_active))
        .or_else(|| usable().next())
        .and_then(|d| d.id.clone())
}

#[derive(PartialEq)]
struct StateKey {
    uri: Option<String>,
    paused: bool,
}

impl StateKey {
    fn of(state: &Option<SdkPlaybackState>) -> Option<StateKey> {
        state.as_ref().map(|s| StateKey {
            uri: s.track_window.current_track.as_ref().map(|t| t.uri.clone()),
            paused: s.paused,
        })
    }
}

struct ConnectInner {
    http: Client,
    base_url: String,
    name: String,
    volume: f32,
    tokens: Arc<dyn TokenSupplier>,
    events: SdkEventSender,
    device_id: RwLock<Option<String>>,
}

impl ConnectInner {
    fn emit(&self, event: SdkEvent) {
        if self.events.send(event).is_err() {
            debug!("Player event receiver is gone");
        }
    }

    fn report(&self, error: PlaybackError) {
        match error {
            PlaybackError::Authentication(message) => {
                self.emit(SdkEvent::AuthenticationError { message })
            }
            PlaybackError::Account(message) => self.emit(SdkEvent::AccountError { message }),
            PlaybackError::NoToken => self.emit(SdkEvent::AuthenticationError {
                message: "no token available".to_string(),
            }),
            other => warn!(error = %other, "Spotify Connect request failed"),
        }
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Response, PlaybackError> {
        let token = self.tokens.token().await.ok_or(PlaybackError::NoToken)?;
        let mut request = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .query(query)
            .bearer_auth(token);
        if method == Method::PUT {
            request = request.header(CONTENT_LENGTH, "0");
        }
        playback_error(request.send().await?).await
    }

    async fn command(&self, path: &str, mut query: Vec<(&str, String)>) -> Result<(), PlaybackError> {
        let device_id = self
            .device_id
            .read()
            .await
            .clone()
            .ok_or(PlaybackError::NotReady)?;
        query.push(("device_id", device_id));
        self.request(Method::PUT, path, &query).await?;
        Ok(())
    }

    async fn devices(&self) -> Result<Vec<Device>, PlaybackError> {
        let res = self.request(Method::GET, "/me/player/devices", &[]).await?;
        Ok(res.json::<DevicesResponse>().await?.devices)
    }

    /// Playback state of this device, `None` when it plays nothing.
    async fn playback(&self) -> Result<Option<SdkPlaybackState>, PlaybackError> {
        let res = self.request(Method::GET, "/me/player", &[]).await?;
        if res.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let current = res.json::<CurrentPlayback>().await?;

        let ours = self.device_id.read().await.clone();
        let on_this_device = match (&current.device, &ours) {
            (Some(device), Some(ours)) => device.id.as_deref() == Some(ours.as_str()),
            _ => true,
        };
        Ok(on_this_device.then(|| current.into_state()))
    }

    async fn discover(&self) -> Result<Option<String>, PlaybackError> {
        let devices = self.devices().await?;
        Ok(choose_device(&devices, &self.name))
    }
}

async fn watch(inner: Arc<ConnectInner>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut announced_missing = false;
    let device_id = loop {
        ticker.tick().await;
        match inner.discover().await {
            Ok(Some(id)) => break id,
            Ok(None) => {
                if !announced_missing {
                    inner.emit(SdkEvent::InitializationError {
                        message: format!(
                            "No Spotify Connect device available, open Spotify on '{}' or any device",
                            inner.name
                        ),
                    });
                    announced_missing = true;
                }
            }
            Err(e) => inner.report(e),
        }
    };

    *inner.device_id.write().await = Some(device_id.clone());
    let volume = ((inner.volume * 100.0).round() as u32).to_string();
    if let Err(e) = inner
        .command("/me/player/volume", vec![("volume_percent", volume)])
        .await
    {
        debug!(error = %e, "Failed to apply initial volume");
    }
    info!(device_id = %device_id, "Spotify Connect device ready");
    inner.emit(SdkEvent::Ready {
        device_id: device_id.clone(),
    });

    let mut last: Option<Option<StateKey>> = None;
    let mut ticks: u32 = 0;
    loop {
        ticker.tick().await;
        ticks = ticks.wrapping_add(1);

        if ticks % DEVICE_CHECK_TICKS == 0 {
            match inner.devices().await {
                Ok(devices) if !devices.iter().any(|d| d.id.as_deref() == Some(device_id.as_str())) => {
                    *inner.device_id.write().await = None;
                    inner.emit(SdkEvent::NotReady { device_id });
                    return;
                }
                Ok(_) => {}
                Err(e) => inner.report(e),
            }
        }

        match inner.playback().await {
            Ok(state) => {
                let key = StateKey::of(&state);
                if last.as_ref() != Some(&key) {
                    last = Some(key);
                    inner.emit(SdkEvent::PlayerStateChanged(state));
                }
            }
            Err(e) => inner.report(e),
        }
    }
}

/// A Spotify Connect device driven through the Web API.
///
/// Commands go to the device chosen by the watcher and fail with
/// [`PlaybackError::NotReady`] until it announced [`SdkEvent::Ready`], or
/// after the device vanished. Request failures of the watcher are reported
/// as events: a rejected token becomes [`SdkEvent::AuthenticationError`],
/// a missing Premium subscription [`SdkEvent::AccountError`].
///
/// Created through [`ConnectPlayerFactory`].
pub struct ConnectPlayer {
    inner: Arc<ConnectInner>,
    interval: Duration,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl PlayerSdk for ConnectPlayer {
    /// Starts the device watcher. Returns `false` without a token; calling
    /// it again while the watcher runs is a no-op returning `true`.
    async fn connect(&self) -> bool {
        let mut watcher = self.watcher.lock().await;
        if watcher.is_some() {
            return true;
        }
        if self.inner.tokens.token().await.is_none() {
            return false;
        }
        *watcher = Some(tokio::spawn(watch(Arc::clone(&self.inner), self.interval)));
        true
    }

    /// Stops the watcher and forgets the device.
    async fn disconnect(&self) {
        if let Some(task) = self.watcher.lock().await.take() {
            task.abort();
        }
        *self.inner.device_id.write().await = None;
    }

    async fn pause(&self) -> Result<(), PlaybackError> {
        self.inner.command("/me/player/pause", Vec::new()).await
    }

    async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        let percent = ((volume.clamp(0.0, 1.0) * 100.0).round() as u32).to_string();
        self.inner
            .command("/me/player/volume", vec![("volume_percent", percent)])
            .await
    }

    async fn seek(&self, position_ms: u64) -> Result<(), PlaybackError> {
        self.inner
            .command("/me/player/seek", vec![("position_ms", position_ms.to_string())])
            .await
    }

    /// Samples `/me/player` once. `None` on failure or when this device
    /// plays nothing.
    async fn get_current_state(&self) -> Option<SdkPlaybackState> {
        match self.inner.playback().await {
            Ok(state) => state,
            Err(e) => {
                debug!(error = %e, "Failed to read player state");
                None
            }
        }
    }
}

/// Creates [`ConnectPlayer`]s against one Web API base URL.
pub struct ConnectPlayerFactory {
    http: Client,
    base_url: String,
    interval: Duration,
}

impl ConnectPlayerFactory {
    /// Creates a factory for the Web API at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Web API root, e.g. `https://api.spotify.com/v1`
    /// * `interval` - Time between two playback samples of a player's
    ///   watcher; the device list is re-checked every fifth sample
    ///
    /// # Example
    ///
    /// ```
    /// let factory = ConnectPlayerFactory::new(
    ///     "https://api.spotify.com/v1".to_string(),
    ///     Duration::from_secs(1),
    /// );
    /// let player = factory.create(options, events_tx);
    /// ```
    pub fn new(base_url: String, interval: Duration) -> Self {
        ConnectPlayerFactory {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            interval,
        }
    }

    /// Creates a factory for `SPOTIFY_API_URL` sampling every
    /// [`DEFAULT_WATCH_INTERVAL`].
    pub fn from_env() -> Self {
        Self::new(config::spotify_apiurl(), DEFAULT_WATCH_INTERVAL)
    }
}

impl PlayerFactory for ConnectPlayerFactory {
    fn create(&self, options: PlayerOptions, events: SdkEventSender) -> Arc<dyn PlayerSdk> {
        Arc::new(ConnectPlayer {
            inner: Arc::new(ConnectInner {
                http: self.http.clone(),
                base_url: self.base_url.clone(),
                name: options.name,
                volume: options.volume,
                tokens: options.tokens,
                events,
                device_id: RwLock::new(None),
            }),
            interval: self.interval,
            watcher: Mutex::new(None),
        })
    }
}
