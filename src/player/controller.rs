use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    player::{
        sdk::{
            PlaybackEndpoint, PlayerFactory, PlayerOptions, PlayerSdk, SdkEvent, SdkEventSender,
        },
        types::{Command, NowPlaying, PlayerStatus, PlayerView},
    },
    session::{SessionCoordinator, TokenSupplier},
};

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub device_name: String,
    pub volume: f32,
}

/// Playback state machine.
///
/// Owns the only player instance. UI commands are intents; the displayed
/// state only follows what the SDK reports through its events and the
/// progress poll.
pub struct PlaybackController {
    options: ControllerOptions,
    session: Arc<SessionCoordinator>,
    factory: Arc<dyn PlayerFactory>,
    endpoint: Arc<dyn PlaybackEndpoint>,
    events: SdkEventSender,
    player: Option<Arc<dyn PlayerSdk>>,
    status: PlayerStatus,
    device_id: Option<String>,
    pending: Option<String>,
    now_playing: Option<NowPlaying>,
    volume: f32,
    view: watch::Sender<PlayerView>,
}

impl PlaybackController {
    pub fn new(
        options: ControllerOptions,
        session: Arc<SessionCoordinator>,
        factory: Arc<dyn PlayerFactory>,
        endpoint: Arc<dyn PlaybackEndpoint>,
        events: SdkEventSender,
    ) -> Self {
        let volume = options.volume;
        let (view, _) = watch::channel(PlayerView::new(volume));
        PlaybackController {
            options,
            session,
            factory,
            endpoint,
            events,
            player: None,
            status: PlayerStatus::Uninitialized,
            device_id: None,
            pending: None,
            now_playing: None,
            volume,
            view,
        }
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn pending_selection(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    pub fn has_player(&self) -> bool {
        self.player.is_some()
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            status: self.status,
            device_id: self.device_id.clone(),
            now_playing: self.now_playing.clone(),
            volume: self.volume,
        }
    }

    pub fn subscribe_view(&self) -> watch::Receiver<PlayerView> {
        self.view.subscribe()
    }

    fn publish(&self) {
        self.view.send_replace(self.view());
    }

    fn set_status(&mut self, status: PlayerStatus) {
        if self.status != status {
            debug!(from = ?self.status, to = ?status, "Player status changed");
            self.status = status;
        }
    }

    /// Constructs and connects the player once a token is available.
    ///
    /// Returns whether a player exists afterwards.
    pub async fn try_initialize(&mut self) -> bool {
        if self.player.is_some() || self.status != PlayerStatus::Uninitialized {
            return self.player.is_some();
        }

        if self.session.ensure_fresh().await.is_none() {
            debug!("No token available, player stays uninitialized");
            return false;
        }

        let tokens: Arc<dyn TokenSupplier> = self.session.clone();
        let player = self.factory.create(
            PlayerOptions {
                name: self.options.device_name.clone(),
                volume: self.options.volume,
                tokens,
            },
            self.events.clone(),
        );
        self.player = Some(Arc::clone(&player));
        self.set_status(PlayerStatus::Connecting);
        self.publish();

        if !player.connect().await {
            error!(device = %self.options.device_name, "Player failed to connect");
            self.set_status(PlayerStatus::Disconnected);
            self.publish();
        }
        true
    }

    pub async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Select(uri) => self.select(uri).await,
            Command::Resume => {
                let Some(device_id) = self.ready_device("resume") else {
                    return;
                };
                if let Err(e) = self.endpoint.play(&device_id, None).await {
                    warn!(error = %e, "Failed to resume playback");
                }
            }
            Command::Pause => {
                let Some(player) = self.ready_player("pause") else {
                    return;
                };
                if let Err(e) = player.pause().await {
                    warn!(error = %e, "Failed to pause playback");
                }
            }
            Command::Seek(position_ms) => {
                let Some(player) = self.ready_player("seek") else {
                    return;
                };
                if let Err(e) = player.seek(position_ms).await {
                    warn!(error = %e, position_ms, "Failed to seek");
                }
            }
            Command::SetVolume(volume) => {
                let volume = volume.clamp(0.0, 1.0);
                let Some(player) = self.ready_player("set volume") else {
                    return;
                };
                match player.set_volume(volume).await {
                    Ok(()) => {
                        self.volume = volume;
                        self.publish();
                    }
                    Err(e) => warn!(error = %e, volume, "Failed to set volume"),
                }
            }
            Command::Shutdown => self.shutdown().await,
        }
    }

    async fn select(&mut self, uri: String) {
        match self.status {
            PlayerStatus::Uninitialized | PlayerStatus::Connecting => {
                debug!(uri = %uri, "Player not ready, keeping selection pending");
                self.pending = Some(uri);
            }
            _ => {
                let Some(device_id) = self.ready_device("play") else {
                    return;
                };
                self.play_uri(&device_id, uri).await;
            }
        }
    }

    async fn play_uri(&self, device_id: &str, uri: String) {
        info!(uri = %uri, device_id, "Playing track");
        if let Err(e) = self.endpoint.play(device_id, Some(std::slice::from_ref(&uri))).await {
            warn!(error = %e, "Failed to start playback");
        }
    }

    fn ready_device(&self, action: &str) -> Option<String> {
        if !self.status.is_ready() {
            debug!(action, status = ?self.status, "Dropping command, no device");
            return None;
        }
        let device_id = self.device_id.clone();
        if device_id.is_none() {
            debug!(action, "Dropping command, no device");
        }
        device_id
    }

    fn ready_player(&self, action: &str) -> Option<Arc<dyn PlayerSdk>> {
        self.ready_device(action)?;
        self.player.clone()
    }

    pub async fn handle_event(&mut self, event: SdkEvent) {
        match event {
            SdkEvent::Ready { device_id } => {
                if self.status == PlayerStatus::Disconnected {
                    warn!(device_id = %device_id, "Ignoring ready event after disconnect");
                    return;
                }
                info!(device_id = %device_id, "Ready with device");
                self.device_id = Some(device_id.clone());
                self.set_status(PlayerStatus::Ready);
                self.publish();

                if let Some(uri) = self.pending.take() {
                    self.play_uri(&device_id, uri).await;
                }
            }
            SdkEvent::NotReady { device_id } => {
                warn!(device_id = %device_id, "Device has gone offline");
                self.device_id = None;
                self.set_status(PlayerStatus::Disconnected);
                self.publish();
            }
            SdkEvent::InitializationError { message } => {
                error!(reason = %message, "Player initialization error");
            }
            SdkEvent::AccountError { message } => {
                error!(reason = %message, "Player account error");
            }
            SdkEvent::AuthenticationError { message } => {
                error!(reason = %message, "Player authentication error");
                if self.session.ensure_fresh().await.is_none() {
                    warn!("No token available after authentication error");
                }
            }
            SdkEvent::PlayerStateChanged(state) => {
                self.now_playing = state.as_ref().and_then(NowPlaying::from_state);
                if state.is_some() && self.now_playing.is_none() {
                    warn!("Player state has no current track");
                }
                if let Some(now) = &self.now_playing {
                    debug!(track = %now.track_name, paused = now.paused, "Now playing");
                }

                if self.status.is_ready() {
                    let status = match &state {
                        Some(s) if s.paused => PlayerStatus::Paused,
                        Some(_) => PlayerStatus::Playing,
                        None => PlayerStatus::Ready,
                    };
                    self.set_status(status);
                }
                self.publish();
            }
        }
    }

    /// Samples position and duration from the player.
    ///
    /// Samples of a different track than the one playing are ignored; the
    /// next state event brings the new track.
    pub async fn poll_progress(&mut self) {
        let Some(player) = self.player.clone() else {
            return;
        };
        let Some(state) = player.get_current_state().await else {
            return;
        };
        let sampled_uri = state.track_window.current_track.as_ref().map(|t| t.uri.as_str());
        if let Some(now) = self.now_playing.as_mut() {
            if sampled_uri != Some(now.uri.as_str()) {
                return;
            }
            if now.position_ms != state.position || now.duration_ms != state.duration {
                now.position_ms = state.position;
                now.duration_ms = state.duration;
                self.publish();
            }
        }
    }

    pub async fn shutdown(&mut self) {
        if let Some(player) = self.player.take() {
            player.disconnect().await;
        }
        self.device_id = None;
        self.pending = None;
        self.set_status(PlayerStatus::Disconnected);
        self.publish();
    }
}
