//! The `cadenza` binary: scan a directory, queue it, take commands on stdin.

use std::env;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::backend::rodio::RodioOutput;
use crate::events::{EventKind, ListenerHandle, PlayerEvent};
use crate::library::scan;
use crate::persist::{self, LastTrackFile};
use crate::player::Player;
use crate::{config, logging};

mod commands;
mod console;
mod settings;

fn music_dir() -> PathBuf {
    env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("Music"))
}

fn spawn_player(settings: &config::Settings) -> crate::Result<Player> {
    let status_interval = Duration::from_millis(settings.audio.status_interval_ms);
    let player = Player::spawn(
        move || RodioOutput::open_default(status_interval),
        settings.playback.engine_options(),
        Duration::from_millis(settings.audio.poll_interval_ms),
    )?;
    player.setup()?;
    Ok(player)
}

/// Mirror player events into the log.
fn log_events(player: &Player) -> Vec<ListenerHandle> {
    let store = player.store().clone();
    vec![
        player.add_event_listener(EventKind::PlaybackState, |event| {
            if let PlayerEvent::PlaybackState(state) = event {
                info!(?state, "playback state");
            }
        }),
        player.add_event_listener(EventKind::PlaybackError, |event| {
            if let PlayerEvent::PlaybackError(msg) = event {
                error!("playback error: {msg}");
            }
        }),
        player.add_event_listener(EventKind::ActiveTrackChanged, move |event| {
            if let PlayerEvent::ActiveTrackChanged(index) = event {
                let state = store.snapshot();
                match state.active_track() {
                    Some(track) => info!(index = ?index, track = %track.display(), "now active"),
                    None => info!("no active track"),
                }
            }
        }),
    ]
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (settings, problem) = settings::load_settings();
    logging::init(&settings.logging);
    if let Some(msg) = problem {
        warn!("{msg}");
    }

    let dir = music_dir();
    let tracks = scan(&dir, &settings.library);
    info!(dir = %dir.display(), tracks = tracks.len(), "library scanned");

    let player = spawn_player(&settings)?;
    let _log_handles = log_events(&player);
    let last_track = LastTrackFile::from_settings(&settings.state);

    if let Err(e) = player.set_queue(tracks) {
        // A track that fails to load stays current; `play` retries it.
        warn!("initial queue: {e}");
    }
    if let Some(file) = &last_track {
        if let Err(e) = persist::restore_last_track(&player, file) {
            warn!("restoring last track: {e}");
        }
    }
    let _remember = last_track.map(|file| persist::remember_active_track(&player, file));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    console::run(&player, io::stdin().lock(), &mut out)?;

    info!("bye");
    Ok(())
}
