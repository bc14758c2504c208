use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::debug;

use crate::{
    player::{
        controller::{ControllerOptions, PlaybackController},
        sdk::{PlaybackEndpoint, PlayerFactory, SdkEventReceiver},
        types::{Command, PlayerStatus, PlayerView},
    },
    session::SessionCoordinator,
    types::Session,
};

/// Interval of the position/duration poll.
pub const PROGRESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to a running playback controller.
///
/// Dropping the handle stops the controller and disconnects the player.
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<PlayerView>,
    task: JoinHandle<()>,
}

/// Starts the playback controller and returns its handle.
///
/// The player is constructed as soon as the session coordinator has a
/// token, immediately or after a later sign-in.
pub fn initialize(
    options: ControllerOptions,
    session: Arc<SessionCoordinator>,
    factory: Arc<dyn PlayerFactory>,
    endpoint: Arc<dyn PlaybackEndpoint>,
) -> PlayerHandle {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let session_changes = session.watch();
    let controller = PlaybackController::new(options, session, factory, endpoint, events_tx);
    let view = controller.subscribe_view();
    let task = tokio::spawn(run(controller, commands_rx, events_rx, session_changes));

    PlayerHandle {
        commands: commands_tx,
        view,
        task,
    }
}

async fn run(
    mut controller: PlaybackController,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: SdkEventReceiver,
    mut session_changes: watch::Receiver<Option<Session>>,
) {
    controller.try_initialize().await;

    let mut poll = tokio::time::interval(PROGRESS_POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut session_open = true;

    loop {
        let waiting_for_token = session_open && controller.status() == PlayerStatus::Uninitialized;

        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => break,
                Some(command) => controller.handle_command(command).await,
            },
            Some(event) = events.recv() => controller.handle_event(event).await,
            changed = session_changes.changed(), if waiting_for_token => match changed {
                Ok(()) => {
                    controller.try_initialize().await;
                }
                Err(_) => session_open = false,
            },
            _ = poll.tick(), if controller.has_player() => controller.poll_progress().await,
        }
    }

    debug!("Playback controller stopping");
    controller.shutdown().await;
}

impl PlayerHandle {
    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Playback controller is gone, dropping command");
        }
    }

    /// Selects a track; plays it now or as soon as the device is ready.
    pub fn select(&self, uri: impl Into<String>) {
        self.send(Command::Select(uri.into()));
    }

    pub fn resume(&self) {
        self.send(Command::Resume);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn seek(&self, position_ms: u64) {
        self.send(Command::Seek(position_ms));
    }

    pub fn set_volume(&self, volume: f32) {
        self.send(Command::SetVolume(volume));
    }

    pub fn view(&self) -> PlayerView {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<PlayerView> {
        self.view.clone()
    }

    /// Stops the controller and waits until the player is disconnected.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }
}
