use crate::player::sdk::SdkPlaybackState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// No token yet, no player constructed.
    Uninitialized,
    /// Player constructed, waiting for the device id.
    Connecting,
    /// Device known, nothing reported playing.
    Ready,
    Playing,
    Paused,
    /// The device went offline or the handshake could not start.
    Disconnected,
}

impl PlayerStatus {
    pub fn is_ready(self) -> bool {
        matches!(
            self,
            PlayerStatus::Ready | PlayerStatus::Playing | PlayerStatus::Paused
        )
    }
}

/// Snapshot of what the player last reported.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub uri: String,
    pub track_name: String,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    pub cover_art_url: Option<String>,
    pub paused: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl NowPlaying {
    /// `None` when the state carries no current track.
    pub fn from_state(state: &SdkPlaybackState) -> Option<Self> {
        let track = state.track_window.current_track.as_ref()?;
        Some(NowPlaying {
            uri: track.uri.clone(),
            track_name: track.name.clone(),
            artist_name: track.artists.first().map(|a| a.name.clone()),
            album_name: Some(track.album.name.clone()).filter(|n| !n.is_empty()),
            cover_art_url: track.album.images.first().map(|i| i.url.clone()),
            paused: state.paused,
            position_ms: state.position,
            duration_ms: state.duration,
        })
    }
}

/// What the UI renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub status: PlayerStatus,
    pub device_id: Option<String>,
    pub now_playing: Option<NowPlaying>,
    pub volume: f32,
}

impl PlayerView {
    pub fn new(volume: f32) -> Self {
        PlayerView {
            status: PlayerStatus::Uninitialized,
            device_id: None,
            now_playing: None,
            volume,
        }
    }
}

/// UI intents sent to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Load and play a track uri.
    Select(String),
    Resume,
    Pause,
    Seek(u64),
    SetVolume(f32),
    Shutdown,
}
