//! Queue membership and index bookkeeping.

use tracing::debug;

use crate::backend::AudioOutput;
use crate::error::Result;
use crate::events::{PlayerEvent, PlayerState};
use crate::state::{PlaybackState, PlaybackUpdate};
use crate::track::{Track, TrackMetadata};

use super::Engine;

/// Index of the first track without a playable url.
fn first_invalid(tracks: &[Track]) -> Option<usize> {
    tracks.iter().position(|t| !t.is_valid())
}

impl<O: AudioOutput> Engine<O> {
    /// Replace the queue and load its first track, paused.
    ///
    /// An empty `tracks` clears the engine the same way [`Engine::reset`]
    /// does.
    pub fn set_queue(&mut self, tracks: Vec<Track>) -> Result<()> {
        if let Some(bad) = first_invalid(&tracks) {
            return self.reject(format!("track {bad} has an empty url"));
        }
        if tracks.is_empty() {
            self.reset();
            return Ok(());
        }

        let was_playing = self.store.snapshot().is_playing;
        debug!(len = tracks.len(), "setting queue");
        // Keep the old source from playing on under the new index.
        self.backend.pause();
        self.store.update(
            PlaybackUpdate::new()
                .queue(tracks)
                .current_index(Some(0))
                .playing(false)
                .position(0.0)
                .duration(0.0),
        );
        if was_playing {
            self.emit(PlayerEvent::PlaybackState(PlayerState::Stopped));
        }
        self.load_track(0)
    }

    /// Append to the end of the queue without disturbing playback. Pass a
    /// one-element array to add a single track.
    ///
    /// When the queue was empty, the first appended track becomes current and
    /// is loaded, not played.
    pub fn add(&mut self, tracks: impl IntoIterator<Item = Track>) -> Result<()> {
        let tracks: Vec<Track> = tracks.into_iter().collect();
        if let Some(bad) = first_invalid(&tracks) {
            return self.reject(format!("track {bad} has an empty url"));
        }
        if tracks.is_empty() {
            return Ok(());
        }

        let state = self.store.snapshot();
        let mut queue = state.queue.to_vec();
        queue.extend(tracks);

        if state.current_index.is_some() {
            self.store.update(PlaybackUpdate::new().queue(queue));
            return Ok(());
        }

        self.store.update(
            PlaybackUpdate::new()
                .queue(queue)
                .current_index(Some(0))
                .position(0.0)
                .duration(0.0),
        );
        self.load_track(0)
    }

    /// Remove the track at `index`, keeping the current track current when
    /// it survives.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        let state = self.store.snapshot();
        if index >= state.queue.len() {
            return self.reject(format!(
                "remove index {index} out of range for queue of {}",
                state.queue.len()
            ));
        }

        let mut queue = state.queue.to_vec();
        queue.remove(index);

        let removed_current = state.current_index == Some(index);
        let next_index = match state.current_index {
            Some(_) if removed_current => {
                (!queue.is_empty()).then(|| index.min(queue.len() - 1))
            }
            Some(current) if index < current => Some(current - 1),
            other => other,
        };

        self.store.update(
            PlaybackUpdate::new()
                .queue(queue)
                .current_index(next_index),
        );

        if !removed_current {
            return Ok(());
        }
        match next_index {
            Some(next) => self.load_track(next),
            None => {
                self.clear_playback(&state);
                Ok(())
            }
        }
    }

    /// Clear the queue and release the backend.
    pub fn reset(&mut self) {
        let state = self.store.snapshot();
        self.store.update(
            PlaybackUpdate::new()
                .queue(Vec::<Track>::new())
                .current_index(None),
        );
        debug!(dropped = state.queue.len(), "queue reset");
        self.clear_playback(&state);
    }

    /// Merge display metadata into the track at `index`. The url, and with it
    /// the track's identity, is never touched.
    pub fn update_metadata_for_track(
        &mut self,
        index: usize,
        metadata: TrackMetadata,
    ) -> Result<()> {
        let state = self.store.snapshot();
        let Some(track) = state.queue.get(index) else {
            return self.reject(format!(
                "metadata index {index} out of range for queue of {}",
                state.queue.len()
            ));
        };

        let mut queue = state.queue.to_vec();
        queue[index] = track.merged(&metadata);
        self.store.update(PlaybackUpdate::new().queue(queue));
        Ok(())
    }

    /// The engine has no current track any more: drop the handle and zero
    /// the transport fields. `before` is the state prior to the change.
    fn clear_playback(&mut self, before: &PlaybackState) {
        self.backend.dispose();
        self.ended = false;
        self.store.update(
            PlaybackUpdate::new()
                .playing(false)
                .position(0.0)
                .duration(0.0),
        );
        if before.is_playing {
            self.emit(PlayerEvent::PlaybackState(PlayerState::Stopped));
        }
        if before.current_index.is_some() {
            self.emit(PlayerEvent::ActiveTrackChanged(None));
        }
    }
}
