//! # Player
//!
//! Playback coordination between the UI and an external player SDK.
//!
//! ```text
//!  UI ── Command ──▶ ┌────────────────────┐ ── play ──▶ PlaybackEndpoint
//!                    │ PlaybackController │ ── pause/seek/volume ──▶ PlayerSdk
//!  UI ◀─ PlayerView ─└────────────────────┘ ◀── SdkEvent ── PlayerSdk
//! ```
//!
//! [`initialize`] spawns the controller as a single task and returns a
//! [`PlayerHandle`]. The task is the only owner of the SDK player; the UI
//! sends intents and renders the [`PlayerView`] it receives back.
//!
//! The controller moves through [`PlayerStatus`]:
//! `Uninitialized → Connecting → Ready ↔ Playing/Paused`, ending in
//! `Disconnected` when the device goes offline. Commands that need a device
//! are dropped until the SDK's ready event delivered one, except for a track
//! selection, which is kept and played on ready.

mod controller;
mod handle;
pub mod sdk;
mod types;

pub use controller::{ControllerOptions, PlaybackController};
pub use handle::{PROGRESS_POLL_INTERVAL, PlayerHandle, initialize};
pub use types::{Command, NowPlaying, PlayerStatus, PlayerView};
