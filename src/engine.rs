//! The playback engine: queue, transport and track-end reconciliation over a
//! single audio handle.
//!
//! Every operation takes `&mut self`, so two state-changing operations can
//! never interleave; callers that need to share the engine across threads use
//! [`crate::player::Player`], which owns it on a dedicated thread.
//!
//! Backend status arrives asynchronously on the status channel and is applied
//! by [`Engine::drain_status`]. Payloads from a superseded load are recognised
//! by their generation and dropped.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};

use tracing::{debug, error, warn};

use crate::backend::{AudioBackendAdapter, AudioOutput, StatusEvent};
use crate::error::{BackendError, PlaybackError, Result};
use crate::events::{EventBus, EventKind, ListenerHandle, PlayerEvent, PlayerState};
use crate::state::{
    DEFAULT_VOLUME, PlaybackState, PlaybackStateStore, PlaybackUpdate, RepeatMode,
    StateSubscription,
};
use crate::track::Track;

mod queue;
mod track_end;
mod transport;

pub use track_end::EndTransition;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub volume: f32,
    pub repeat_mode: RepeatMode,
    /// Reject invalid arguments with `PlaybackError::InvalidArgument`
    /// instead of ignoring them.
    pub strict_arguments: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            repeat_mode: RepeatMode::Queue,
            strict_arguments: false,
        }
    }
}

impl EngineOptions {
    /// The state a fresh engine starts from: empty queue, configured volume
    /// and repeat mode.
    pub fn initial_state(&self) -> PlaybackState {
        let volume = if (0.0..=1.0).contains(&self.volume) {
            self.volume
        } else {
            DEFAULT_VOLUME
        };
        PlaybackState {
            volume,
            repeat_mode: self.repeat_mode,
            ..PlaybackState::default()
        }
    }
}

/// Where the engine is in its transport lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Empty queue, no handle.
    NoTrack,
    /// A track is loaded and parked at its start.
    Loaded,
    Playing,
    Paused,
    /// The last track played out with nothing left to advance to.
    Ended,
}

pub struct Engine<O: AudioOutput> {
    store: PlaybackStateStore,
    events: EventBus,
    backend: AudioBackendAdapter<O>,
    status_rx: Receiver<StatusEvent>,
    ended: bool,
    strict_arguments: bool,
}

impl<O: AudioOutput> Engine<O> {
    pub fn new(output: O, options: EngineOptions) -> Self {
        let store = PlaybackStateStore::new(options.initial_state());
        Self::with_parts(output, store, EventBus::new(), &options)
    }

    /// Build an engine around a store and event bus that callers already hold
    /// clones of.
    pub fn with_parts(
        output: O,
        store: PlaybackStateStore,
        events: EventBus,
        options: &EngineOptions,
    ) -> Self {
        let (status_tx, status_rx) = mpsc::channel();
        Self {
            store,
            events,
            backend: AudioBackendAdapter::new(output, status_tx),
            status_rx,
            ended: false,
            strict_arguments: options.strict_arguments,
        }
    }

    pub fn store(&self) -> &PlaybackStateStore {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn snapshot(&self) -> Arc<PlaybackState> {
        self.store.snapshot()
    }

    pub fn subscribe<F>(&self, listener: F) -> StateSubscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn add_event_listener<F>(&self, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.events.add_event_listener(kind, listener)
    }

    pub fn phase(&self) -> Phase {
        let state = self.store.snapshot();
        match state.current_index {
            None => Phase::NoTrack,
            Some(_) if state.is_playing => Phase::Playing,
            Some(_) if self.ended => Phase::Ended,
            Some(_) if state.position == 0.0 => Phase::Loaded,
            Some(_) => Phase::Paused,
        }
    }

    /// Release the backend. The engine stays usable; the next load creates a
    /// fresh handle.
    pub fn teardown(&mut self) {
        self.backend.dispose();
        if self.store.snapshot().is_playing {
            self.store.update(PlaybackUpdate::new().playing(false));
            self.emit(PlayerEvent::PlaybackState(PlayerState::Stopped));
        }
    }

    /// Apply every status payload queued by the backend. Returns how many
    /// were taken off the channel, stale ones included.
    pub fn drain_status(&mut self) -> usize {
        let mut taken = 0;
        while let Ok(event) = self.status_rx.try_recv() {
            taken += 1;
            if let Err(e) = self.handle_status(event) {
                // Status is a push event: there is no caller to hand this to.
                error!("status handling failed: {e}");
            }
        }
        taken
    }

    pub fn handle_status(&mut self, event: StatusEvent) -> Result<()> {
        if event.generation != self.backend.generation() {
            debug!(
                stale = event.generation,
                current = self.backend.generation(),
                "dropping status from superseded load"
            );
            return Ok(());
        }

        let status = event.status;
        if !status.is_loaded {
            return Ok(());
        }
        if !status.is_well_formed() {
            warn!(?status, "dropping malformed status");
            return Ok(());
        }

        let before = self.store.snapshot();
        let duration = status
            .duration
            .filter(|d| *d > 0.0)
            .unwrap_or(before.duration);
        let mut update = PlaybackUpdate::new()
            .duration(duration)
            .position(status.current_time);
        // A finishing tick leaves `is_playing` to the end-of-track transition.
        if !status.did_just_finish {
            update = update.playing(status.playing);
        }
        self.store.update(update);

        if status.did_just_finish {
            return self.handle_natural_end();
        }
        if status.playing {
            self.ended = false;
        }
        if status.playing != before.is_playing {
            let state = if status.playing {
                PlayerState::Playing
            } else {
                PlayerState::Paused
            };
            self.emit(PlayerEvent::PlaybackState(state));
        }
        Ok(())
    }

    fn emit(&self, event: PlayerEvent) {
        self.events.emit(event);
    }

    /// Invalid arguments are ignored unless strict mode is on.
    fn reject(&self, reason: String) -> Result<()> {
        if self.strict_arguments {
            return Err(PlaybackError::InvalidArgument(reason));
        }
        debug!("ignoring invalid argument: {reason}");
        Ok(())
    }

    fn backend_failure(&self, e: BackendError) -> PlaybackError {
        error!("backend operation failed: {e}");
        self.emit(PlayerEvent::PlaybackError(e.to_string()));
        PlaybackError::Backend(e)
    }

    /// Make `index` current and bind the backend to it.
    ///
    /// The index is committed before the backend is touched, so a failed load
    /// leaves `current_index` on the track that failed; the next `play` retries
    /// it.
    fn load_track(&mut self, index: usize) -> Result<()> {
        let state = self.store.snapshot();
        let Some(track) = state.queue.get(index) else {
            return Ok(());
        };

        self.ended = false;
        self.store.update(
            PlaybackUpdate::new()
                .current_index(Some(index))
                .position(0.0)
                .duration(0.0),
        );

        let looping = state.repeat_mode == RepeatMode::Track;
        if let Err(source) = self.backend.load(track, state.volume, looping) {
            let err = PlaybackError::BackendLoad { index, source };
            error!(url = %track.url, "{err}");
            self.emit(PlayerEvent::PlaybackError(err.to_string()));
            // The previous handle went with the failed load: nothing is
            // producing audio any more.
            if state.is_playing && !self.backend.is_loaded() {
                self.store.update(PlaybackUpdate::new().playing(false));
                self.emit(PlayerEvent::PlaybackState(PlayerState::Stopped));
            }
            return Err(err);
        }

        self.store.update(
            PlaybackUpdate::new()
                .duration(self.backend.duration())
                .position(self.backend.current_time()),
        );
        self.emit(PlayerEvent::ActiveTrackChanged(Some(index)));
        Ok(())
    }

    // ===== State queries =====

    pub fn get_queue(&self) -> Vec<Track> {
        self.store.snapshot().queue.to_vec()
    }

    pub fn get_volume(&self) -> f32 {
        self.store.snapshot().volume
    }

    pub fn get_repeat_mode(&self) -> RepeatMode {
        self.store.snapshot().repeat_mode
    }

    pub fn get_active_track(&self) -> Option<Track> {
        self.store.snapshot().active_track().cloned()
    }

    pub fn get_active_track_index(&self) -> Option<usize> {
        self.store.snapshot().current_index
    }
}
