use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    config, error, info,
    player::{self, ControllerOptions, PlayerHandle, PlayerStatus, PlayerView},
    spotify::{catalog::CatalogClient, connect::ConnectPlayerFactory, playback::WebPlaybackEndpoint},
    types::{Collection, Listing, Track},
    utils, warning,
};

const HELP: &str = "pause | resume | next | prev | track <n> | seek <m:ss|secs> | volume <0-100> | quit";

/// Prompt commands understood while playing.
#[derive(Debug, PartialEq)]
enum Prompt {
    Pause,
    Resume,
    Next,
    Prev,
    Track(usize),
    Seek(u64),
    Volume(f32),
    Help,
    Quit,
}

fn parse_prompt(line: &str) -> Result<Prompt, String> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next();

    match (command.as_str(), arg) {
        ("pause" | "p", None) => Ok(Prompt::Pause),
        ("resume" | "r", None) => Ok(Prompt::Resume),
        ("next" | "n", None) => Ok(Prompt::Next),
        ("prev" | "b", None) => Ok(Prompt::Prev),
        ("quit" | "q" | "exit", None) => Ok(Prompt::Quit),
        ("help" | "?", None) => Ok(Prompt::Help),
        ("track" | "t", Some(n)) => match n.parse::<usize>() {
            Ok(n) if n > 0 => Ok(Prompt::Track(n)),
            _ => Err(format!("invalid track number '{}'", n)),
        },
        ("seek" | "s", Some(at)) => parse_position(at)
            .map(Prompt::Seek)
            .ok_or_else(|| format!("invalid position '{}'", at)),
        ("volume" | "v", Some(v)) => match v.parse::<u32>() {
            Ok(v) if v <= 100 => Ok(Prompt::Volume(v as f32 / 100.0)),
            _ => Err(format!("invalid volume '{}'", v)),
        },
        ("", None) => Err(String::new()),
        _ => Err(format!("unknown command '{}'", line.trim())),
    }
}

/// `m:ss` or whole seconds, in milliseconds.
fn parse_position(s: &str) -> Option<u64> {
    let secs = match s.split_once(':') {
        Some((m, s)) => {
            let secs = s.parse::<u64>().ok()?;
            if secs >= 60 {
                return None;
            }
            m.parse::<u64>().ok()? * 60 + secs
        }
        None => s.parse::<u64>().ok()?,
    };
    Some(secs * 1000)
}

fn status_label(status: PlayerStatus) -> &'static str {
    match status {
        PlayerStatus::Uninitialized => "waiting for sign-in",
        PlayerStatus::Connecting => "connecting",
        PlayerStatus::Ready => "ready",
        PlayerStatus::Playing => "playing",
        PlayerStatus::Paused => "paused",
        PlayerStatus::Disconnected => "disconnected",
    }
}

fn render(pb: &ProgressBar, view: &PlayerView) {
    let label = status_label(view.status);
    match &view.now_playing {
        Some(now) => {
            pb.set_length(now.duration_ms.max(1));
            pb.set_position(now.position_ms.min(now.duration_ms));
            pb.set_prefix(format!(
                "{} / {}",
                utils::format_duration_ms(now.position_ms),
                utils::format_duration_ms(now.duration_ms)
            ));
            let artist = now.artist_name.as_deref().unwrap_or("unknown artist");
            pb.set_message(format!(
                "{} - {} [{}, vol {:.0}%]",
                now.track_name,
                artist,
                label,
                view.volume * 100.0
            ));
        }
        None => {
            pb.set_length(1);
            pb.set_position(0);
            pb.set_prefix("-:-- / -:--");
            pb.set_message(format!("[{}]", label));
        }
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(1);
    pb.set_style(
        ProgressStyle::with_template("{msg}\n{bar:40.green/white} {prefix}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

fn select(handle: &PlayerHandle, tracks: &[Track], index: usize, pb: &ProgressBar) {
    let track = &tracks[index];
    pb.println(format!("> {}. {} - {}", index + 1, track.name, track.artist_name));
    handle.select(track.uri.clone());
}

pub async fn play(collection: Collection, track: Option<usize>) {
    let Some(session) = super::require_session().await else {
        return;
    };
    let _subscription = match session.subscribe() {
        Ok(subscription) => Some(subscription),
        Err(e) => {
            warning!("Session events unavailable: {}", e);
            None
        }
    };

    let catalog = CatalogClient::from_env(session.clone());
    let pb = super::spinner(&format!("Loading {}...", collection));
    let listing = catalog.load_collection(&collection).await;
    pb.finish_and_clear();

    let tracks = match listing {
        Listing::AccessDenied => {
            super::access_denied_notice();
            return;
        }
        Listing::SignedOut => {
            super::signed_out_notice();
            return;
        }
        Listing::Tracks(tracks) if tracks.is_empty() => {
            warning!("No tracks found for {}", collection);
            return;
        }
        Listing::Tracks(tracks) => tracks,
    };

    let mut current = track.unwrap_or(1).saturating_sub(1);
    if current >= tracks.len() {
        warning!("{} has only {} tracks", collection, tracks.len());
        return;
    }

    let volume = match config::player_volume() {
        Ok(volume) => volume,
        Err(e) => error!("Invalid player configuration. Err: {}", e),
    };
    let handle = player::initialize(
        ControllerOptions {
            device_name: config::device_name(),
            volume,
        },
        session.clone(),
        Arc::new(ConnectPlayerFactory::from_env()),
        Arc::new(WebPlaybackEndpoint::from_env(session.clone())),
    );

    info!("Playing {} ({} tracks). Commands: {}", collection, tracks.len(), HELP);
    let pb = progress_bar();
    select(&handle, &tracks, current, &pb);

    let mut views = handle.watch();
    let view_pb = pb.clone();
    let renderer = tokio::spawn(async move {
        loop {
            let view = views.borrow_and_update().clone();
            render(&view_pb, &view);
            if views.changed().await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                pb.println(format!("Failed to read input: {}", e));
                break;
            }
        };

        match parse_prompt(&line) {
            Ok(Prompt::Quit) => break,
            Ok(Prompt::Help) => pb.println(HELP),
            Ok(Prompt::Pause) => handle.pause(),
            Ok(Prompt::Resume) => handle.resume(),
            Ok(Prompt::Seek(position_ms)) => handle.seek(position_ms),
            Ok(Prompt::Volume(volume)) => handle.set_volume(volume),
            Ok(Prompt::Next) => {
                current = (current + 1) % tracks.len();
                select(&handle, &tracks, current, &pb);
            }
            Ok(Prompt::Prev) => {
                current = current.checked_sub(1).unwrap_or(tracks.len() - 1);
                select(&handle, &tracks, current, &pb);
            }
            Ok(Prompt::Track(n)) if n <= tracks.len() => {
                current = n - 1;
                select(&handle, &tracks, current, &pb);
            }
            Ok(Prompt::Track(n)) => pb.println(format!("No track {}, pick 1-{}", n, tracks.len())),
            Err(message) if message.is_empty() => {}
            Err(message) => pb.println(format!("{}. {}", message, HELP)),
        }
    }

    handle.shutdown().await;
    renderer.abort();
    pb.finish_and_clear();
    info!("Player stopped");
}
