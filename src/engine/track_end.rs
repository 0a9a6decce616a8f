//! What happens when the current track plays to its end.

use tracing::{debug, info};

use crate::backend::AudioOutput;
use crate::error::Result;
use crate::events::{PlayerEvent, PlayerState};
use crate::state::{PlaybackState, PlaybackUpdate, RepeatMode};

use super::Engine;

/// The engine's response to a natural end of track.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EndTransition {
    /// No current track; nothing to do.
    Ignore,
    /// Rewind the current track and keep playing.
    RepeatTrack,
    /// Load and play the track at this index.
    Advance(usize),
    /// Queue exhausted: load and play the first track.
    WrapToStart,
    /// Queue exhausted with repeat off: stop on the last track.
    Finish,
}

impl EndTransition {
    /// Track repeat beats queue advancement; queue repeat only kicks in once
    /// there is nothing left to advance to.
    pub fn decide(state: &PlaybackState) -> Self {
        let Some(current) = state.current_index else {
            return Self::Ignore;
        };
        if state.repeat_mode == RepeatMode::Track {
            return Self::RepeatTrack;
        }
        if current + 1 < state.queue.len() {
            return Self::Advance(current + 1);
        }
        if state.repeat_mode == RepeatMode::Queue && !state.queue.is_empty() {
            return Self::WrapToStart;
        }
        Self::Finish
    }
}

impl<O: AudioOutput> Engine<O> {
    /// React to the backend reporting that the current track finished.
    pub fn handle_natural_end(&mut self) -> Result<()> {
        let state = self.store.snapshot();
        let transition = EndTransition::decide(&state);
        debug!(?transition, current = ?state.current_index, "track ended");

        match transition {
            EndTransition::Ignore => Ok(()),
            EndTransition::RepeatTrack => {
                self.backend
                    .seek_to(0.0)
                    .map_err(|e| self.backend_failure(e))?;
                self.backend.play();
                self.ended = false;
                self.store
                    .update(PlaybackUpdate::new().position(0.0).playing(true));
                if !state.is_playing {
                    self.emit(PlayerEvent::PlaybackState(PlayerState::Playing));
                }
                Ok(())
            }
            EndTransition::Advance(next) => self.skip_to_index(next, Some(true)),
            EndTransition::WrapToStart => {
                info!("end of queue, wrapping to the first track");
                self.skip_to_index(0, Some(true))
            }
            EndTransition::Finish => {
                info!("end of queue");
                self.backend.pause();
                self.ended = true;
                self.store.update(
                    PlaybackUpdate::new()
                        .playing(false)
                        .position(state.duration),
                );
                self.emit(PlayerEvent::PlaybackState(PlayerState::Stopped));
                Ok(())
            }
        }
    }
}
