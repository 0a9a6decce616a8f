//! Remembering the last active track across runs.
//!
//! The track is written to a small TOML file every time the active track
//! changes. On start-up it is queued again, paused, if nothing else was.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{StateSettings, xdg_dir};
use crate::events::{EventKind, ListenerHandle, PlayerEvent};
use crate::player::Player;
use crate::track::Track;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("last-track file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode last track: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("failed to parse last-track file: {0}")]
    Decode(#[from] toml::de::Error),
}

#[derive(Serialize, Deserialize)]
struct LastTrack {
    track: Track,
}

/// The file the last active track lives in.
#[derive(Debug, Clone)]
pub struct LastTrackFile {
    path: PathBuf,
}

impl LastTrackFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `None` when remembering is switched off or no state directory can be
    /// found.
    pub fn from_settings(settings: &StateSettings) -> Option<Self> {
        if !settings.remember_last_track {
            return None;
        }
        settings
            .path
            .as_ref()
            .map(PathBuf::from)
            .or_else(default_path)
            .map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, track: &Track) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = toml::to_string(&LastTrack {
            track: track.clone(),
        })?;
        fs::write(&self.path, body)?;
        debug!(path = %self.path.display(), url = %track.url, "saved last track");
        Ok(())
    }

    /// A missing file is not an error: there is simply nothing to restore.
    pub fn load(&self) -> Result<Option<Track>, PersistError> {
        let body = match fs::read_to_string(&self.path) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let saved: LastTrack = toml::from_str(&body)?;
        Ok(Some(saved.track).filter(Track::is_valid))
    }
}

/// `$XDG_STATE_HOME/cadenza/last_track.toml`, or
/// `~/.local/state/cadenza/last_track.toml`.
pub fn default_path() -> Option<PathBuf> {
    xdg_dir("XDG_STATE_HOME", ".local/state").map(|d| d.join("cadenza").join("last_track.toml"))
}

/// Save the active track whenever it changes. Failures are logged.
pub fn remember_active_track(player: &Player, file: LastTrackFile) -> ListenerHandle {
    let store = player.store().clone();
    player.add_event_listener(EventKind::ActiveTrackChanged, move |event| {
        let PlayerEvent::ActiveTrackChanged(Some(index)) = event else {
            return;
        };
        let state = store.snapshot();
        let Some(track) = state.queue.get(*index) else {
            return;
        };
        if let Err(e) = file.save(track) {
            warn!("could not remember last track: {e}");
        }
    })
}

/// Queue the remembered track if the queue is still empty. Returns whether
/// something was restored.
pub fn restore_last_track(player: &Player, file: &LastTrackFile) -> crate::Result<bool> {
    if !player.get_queue().is_empty() {
        return Ok(false);
    }
    let track = match file.load() {
        Ok(Some(track)) => track,
        Ok(None) => return Ok(false),
        Err(e) => {
            warn!(path = %file.path().display(), "ignoring last-track file: {e}");
            return Ok(false);
        }
    };
    info!(track = %track.display(), "restoring last track");
    player.add([track])?;
    Ok(true)
}
