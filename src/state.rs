//! Playback state types and the store that owns them.
//!
//! `PlaybackState` is the single source of truth the UI reads from. It is only
//! ever replaced wholesale by `PlaybackStateStore::update`, so every snapshot a
//! listener sees is a complete, consistent value.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::track::Track;

mod store;

pub use store::{PlaybackStateStore, StateListener, StateSubscription};

/// Volume used when nothing else was configured.
pub const DEFAULT_VOLUME: f32 = 0.3;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatMode {
    /// Stop once the last track in the queue ends.
    #[serde(alias = "none", alias = "no-loop", alias = "no_loop")]
    Off,
    /// Loop the current track indefinitely.
    #[serde(
        alias = "one",
        alias = "repeat-one",
        alias = "loop-one",
        alias = "loop_one"
    )]
    Track,
    /// Wrap around to the start of the queue.
    #[default]
    #[serde(
        alias = "all",
        alias = "repeat-all",
        alias = "loop-all",
        alias = "loop_all"
    )]
    Queue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    /// Playback order.
    pub queue: Arc<[Track]>,
    /// `None` exactly when `queue` is empty.
    pub current_index: Option<usize>,
    pub is_playing: bool,
    /// Seconds into the current track.
    pub position: f64,
    /// Seconds; 0 while unknown.
    pub duration: f64,
    /// 0.0..=1.0
    pub volume: f32,
    pub repeat_mode: RepeatMode,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            queue: Arc::from(Vec::new()),
            current_index: None,
            is_playing: false,
            position: 0.0,
            duration: 0.0,
            volume: DEFAULT_VOLUME,
            repeat_mode: RepeatMode::Queue,
        }
    }
}

impl PlaybackState {
    /// The track at `current_index`, if any.
    pub fn active_track(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.queue.get(i))
    }

    pub(crate) fn holds_invariants(&self) -> bool {
        let index_ok = match self.current_index {
            None => self.queue.is_empty(),
            Some(i) => i < self.queue.len(),
        };
        index_ok && (0.0..=1.0).contains(&self.volume) && self.position >= 0.0
    }
}

/// A partial update: every `Some` field replaces the stored one.
///
/// `current_index` is doubly optional so that "clear the index" can be told
/// apart from "leave it alone".
#[derive(Debug, Clone, Default)]
pub struct PlaybackUpdate {
    pub queue: Option<Arc<[Track]>>,
    pub current_index: Option<Option<usize>>,
    pub is_playing: Option<bool>,
    pub position: Option<f64>,
    pub duration: Option<f64>,
    pub volume: Option<f32>,
    pub repeat_mode: Option<RepeatMode>,
}

impl PlaybackUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(mut self, queue: impl Into<Arc<[Track]>>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn current_index(mut self, index: Option<usize>) -> Self {
        self.current_index = Some(index);
        self
    }

    pub fn playing(mut self, playing: bool) -> Self {
        self.is_playing = Some(playing);
        self
    }

    pub fn position(mut self, seconds: f64) -> Self {
        self.position = Some(seconds);
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn repeat_mode(mut self, mode: RepeatMode) -> Self {
        self.repeat_mode = Some(mode);
        self
    }

    pub(crate) fn apply_to(self, state: &mut PlaybackState) {
        if let Some(queue) = self.queue {
            state.queue = queue;
        }
        if let Some(index) = self.current_index {
            state.current_index = index;
        }
        if let Some(playing) = self.is_playing {
            state.is_playing = playing;
        }
        if let Some(position) = self.position {
            state.position = position;
        }
        if let Some(duration) = self.duration {
            state.duration = duration;
        }
        if let Some(volume) = self.volume {
            state.volume = volume;
        }
        if let Some(mode) = self.repeat_mode {
            state.repeat_mode = mode;
        }
    }
}
