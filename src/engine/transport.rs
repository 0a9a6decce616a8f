//! The user-facing verbs: play, pause, stop, seek, skip, volume, repeat.

use tracing::debug;

use crate::backend::AudioOutput;
use crate::error::Result;
use crate::events::{PlayerEvent, PlayerState};
use crate::state::{PlaybackUpdate, RepeatMode};

use super::Engine;

impl<O: AudioOutput> Engine<O> {
    /// Put the output in playback mode ahead of the first `play`.
    pub fn setup(&mut self) -> Result<()> {
        self.backend
            .configure()
            .map_err(|e| self.backend_failure(e))
    }

    /// Start or resume the current track. Does nothing on an empty queue.
    ///
    /// After the queue played out (`Phase::Ended`) this restarts the current
    /// track from the top.
    pub fn play(&mut self) -> Result<()> {
        let state = self.store.snapshot();
        if state.queue.is_empty() {
            return Ok(());
        }

        self.setup()?;
        let index = state.current_index.unwrap_or(0);
        if state.current_index.is_none() || !self.backend.is_loaded() {
            self.load_track(index)?;
        }

        if self.ended {
            self.backend.seek_to(0.0).map_err(|e| self.backend_failure(e))?;
            self.store.update(PlaybackUpdate::new().position(0.0));
            self.ended = false;
        }

        self.backend.play();
        self.store.update(PlaybackUpdate::new().playing(true));
        self.emit(PlayerEvent::PlaybackState(PlayerState::Playing));
        Ok(())
    }

    /// Never fails, with or without a loaded track.
    pub fn pause(&mut self) {
        self.backend.pause();
        self.store.update(PlaybackUpdate::new().playing(false));
        self.emit(PlayerEvent::PlaybackState(PlayerState::Paused));
    }

    /// Pause and rewind to the start of the current track.
    pub fn stop(&mut self) -> Result<()> {
        self.backend.pause();
        self.backend.seek_to(0.0).map_err(|e| self.backend_failure(e))?;
        self.ended = false;
        self.store
            .update(PlaybackUpdate::new().playing(false).position(0.0));
        self.emit(PlayerEvent::PlaybackState(PlayerState::Stopped));
        Ok(())
    }

    /// Jump within the current track. `position` is updated right away and
    /// corrected by the next status tick.
    pub fn seek_to(&mut self, seconds: f64) -> Result<()> {
        if !self.backend.is_loaded() {
            return Ok(());
        }
        if !seconds.is_finite() || seconds < 0.0 {
            return self.reject(format!("cannot seek to {seconds}"));
        }

        self.backend
            .seek_to(seconds)
            .map_err(|e| self.backend_failure(e))?;
        self.ended = false;
        self.store.update(PlaybackUpdate::new().position(seconds));
        Ok(())
    }

    /// Make `index` current, keeping the engine playing if it was.
    pub fn skip(&mut self, index: usize) -> Result<()> {
        self.skip_to_index(index, None)
    }

    /// Make `index` current. `autoplay` forces playback on or off; `None`
    /// keeps whatever the engine was doing.
    pub fn skip_to_index(&mut self, index: usize, autoplay: Option<bool>) -> Result<()> {
        let state = self.store.snapshot();
        if index >= state.queue.len() {
            return self.reject(format!(
                "skip index {index} out of range for queue of {}",
                state.queue.len()
            ));
        }

        let should_play = autoplay.unwrap_or(state.is_playing);
        debug!(from = ?state.current_index, to = index, should_play, "skipping");
        self.load_track(index)?;

        if should_play {
            return self.play();
        }
        self.backend.pause();
        self.store
            .update(PlaybackUpdate::new().playing(false).position(0.0));
        if state.is_playing {
            self.emit(PlayerEvent::PlaybackState(PlayerState::Paused));
        }
        Ok(())
    }

    /// Wraps from the last track to the first.
    pub fn skip_to_next(&mut self) -> Result<()> {
        let state = self.store.snapshot();
        match state.current_index {
            Some(current) if !state.queue.is_empty() => {
                self.skip((current + 1) % state.queue.len())
            }
            _ => Ok(()),
        }
    }

    /// Wraps from the first track to the last.
    pub fn skip_to_previous(&mut self) -> Result<()> {
        let state = self.store.snapshot();
        match state.current_index {
            Some(0) if !state.queue.is_empty() => self.skip(state.queue.len() - 1),
            Some(current) if !state.queue.is_empty() => self.skip(current - 1),
            _ => Ok(()),
        }
    }

    /// Values outside `0.0..=1.0` are invalid and leave the volume alone.
    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return self.reject(format!("volume {volume} outside 0..=1"));
        }
        self.store.update(PlaybackUpdate::new().volume(volume));
        self.backend.set_volume(volume);
        Ok(())
    }

    /// Takes effect on the loaded track immediately; no reload.
    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.store.update(PlaybackUpdate::new().repeat_mode(mode));
        self.backend
            .set_loop_single_track(mode == RepeatMode::Track);
    }
}
