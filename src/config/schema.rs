use serde::Deserialize;

use crate::engine::EngineOptions;
use crate::state::{DEFAULT_VOLUME, RepeatMode};

/// Top-level settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/cadenza/config.toml` or `~/.config/cadenza/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `CADENZA__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub playback: PlaybackSettings,
    pub audio: AudioSettings,
    pub library: LibrarySettings,
    pub state: StateSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Initial volume, 0.0..=1.0.
    pub volume: f32,
    /// Initial repeat mode.
    pub repeat_mode: RepeatMode,
    /// Reject invalid arguments (bad index, out-of-range volume) with an
    /// error instead of ignoring them.
    pub strict_arguments: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            repeat_mode: RepeatMode::Queue,
            strict_arguments: false,
        }
    }
}

impl PlaybackSettings {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            volume: self.volume,
            repeat_mode: self.repeat_mode,
            strict_arguments: self.strict_arguments,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// How often a loaded track reports its position (milliseconds).
    pub status_interval_ms: u64,
    /// How long the engine thread waits for a command before applying
    /// pending status (milliseconds).
    pub poll_interval_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            status_interval_ms: 250,
            poll_interval_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec!["mp3".into(), "flac".into(), "wav".into(), "ogg".into()],
            follow_links: true,
            include_hidden: false,
            recursive: true,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    /// Save the active track and queue it again on the next start.
    pub remember_last_track: bool,
    /// Where the last track is kept. Defaults to
    /// `$XDG_STATE_HOME/cadenza/last_track.toml`.
    pub path: Option<String>,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            remember_last_track: true,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive. `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "cadenza=info".to_string(),
        }
    }
}
