//! Abstraction over the external playback SDK.
//!
//! The SDK is a device the listener's account can stream to. It announces
//! its lifecycle and the playback state asynchronously; those announcements
//! arrive as [`SdkEvent`]s on a channel handed to it at construction, in the
//! order the SDK emitted them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    error::PlaybackError,
    session::TokenSupplier,
    types::{AlbumRef, ArtistRef},
};

pub type SdkEventSender = mpsc::UnboundedSender<SdkEvent>;
pub type SdkEventReceiver = mpsc::UnboundedReceiver<SdkEvent>;

#[derive(Debug, Clone, PartialEq)]
pub enum SdkEvent {
    /// Handshake completed, the device can receive commands.
    Ready { device_id: String },
    /// The device went offline.
    NotReady { device_id: String },
    InitializationError { message: String },
    AuthenticationError { message: String },
    AccountError { message: String },
    /// `None` when nothing is loaded on this device.
    PlayerStateChanged(Option<SdkPlaybackState>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkPlaybackState {
    pub paused: bool,
    /// Position in milliseconds.
    pub position: u64,
    /// Duration in milliseconds.
    pub duration: u64,
    pub track_window: TrackWindow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackWindow {
    pub current_track: Option<SdkTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkTrack {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: AlbumRef,
}

/// Construction parameters for a player instance.
#[derive(Clone)]
pub struct PlayerOptions {
    pub name: String,
    pub volume: f32,
    /// Asked for a token every time the SDK needs one.
    pub tokens: Arc<dyn TokenSupplier>,
}

/// Handle to one SDK player instance.
#[async_trait]
pub trait PlayerSdk: Send + Sync {
    /// Starts the handshake. Returns `false` when it could not be started;
    /// completion is announced by [`SdkEvent::Ready`].
    async fn connect(&self) -> bool;

    async fn disconnect(&self);

    async fn pause(&self) -> Result<(), PlaybackError>;

    /// `volume` between 0.0 and 1.0.
    async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError>;

    async fn seek(&self, position_ms: u64) -> Result<(), PlaybackError>;

    async fn get_current_state(&self) -> Option<SdkPlaybackState>;
}

/// Creates player instances bound to an event channel.
pub trait PlayerFactory: Send + Sync {
    fn create(&self, options: PlayerOptions, events: SdkEventSender) -> Arc<dyn PlayerSdk>;
}

/// Starts or resumes playback on a device.
#[async_trait]
pub trait PlaybackEndpoint: Send + Sync {
    /// With `uris` the device loads and plays them, without it resumes.
    async fn play(&self, device_id: &str, uris: Option<&[String]>) -> Result<(), PlaybackError>;
}
