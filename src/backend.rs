//! The boundary to the native audio primitive.
//!
//! `AudioOutput` creates handles, `AudioHandle` is one loaded resource with
//! transport primitives and a periodic status stream. The engine never talks
//! to these traits directly: `AudioBackendAdapter` owns the one live handle
//! and tags every status payload with the load it belongs to.

use crate::error::BackendError;

mod adapter;
pub mod rodio;

#[cfg(test)]
pub(crate) mod fake;

pub use adapter::AudioBackendAdapter;

/// One periodic status payload from a handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStatus {
    /// Seconds into the current resource.
    pub current_time: f64,
    /// Seconds, when the backend knows it.
    pub duration: Option<f64>,
    pub playing: bool,
    /// Set on the single tick where the resource played to its end.
    pub did_just_finish: bool,
    /// `false` while the backend is still opening the resource.
    pub is_loaded: bool,
}

impl PlaybackStatus {
    /// Negative or non-finite times mean the payload is garbage.
    pub fn is_well_formed(&self) -> bool {
        let ok = |v: f64| v.is_finite() && v >= 0.0;
        ok(self.current_time) && self.duration.is_none_or(ok)
    }
}

/// A status payload tagged with the generation of the load that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusEvent {
    pub generation: u64,
    pub status: PlaybackStatus,
}

/// Called by the backend on its own thread, at a bounded interval.
pub type StatusCallback = Box<dyn Fn(PlaybackStatus) + Send + 'static>;

/// Factory for handles. Lives on the thread that owns the engine.
pub trait AudioOutput {
    type Handle: AudioHandle;

    /// Put the output in the mode playback requires. Called before every
    /// `play`, so it must be cheap when already configured.
    fn configure(&mut self) -> Result<(), BackendError>;

    /// Open `uri` in a new, paused handle.
    fn create(&mut self, uri: &str) -> Result<Self::Handle, BackendError>;
}

/// One loaded audio resource.
pub trait AudioHandle {
    type Subscription: StatusSubscription;

    /// Swap the resource while reusing the playback machinery.
    fn replace(&mut self, uri: &str) -> Result<(), BackendError>;
    fn play(&mut self);
    fn pause(&mut self);
    fn seek_to(&mut self, seconds: f64) -> Result<(), BackendError>;
    fn set_volume(&mut self, volume: f32);
    /// Loop the current resource on the backend side.
    fn set_loop(&mut self, looping: bool);
    fn current_time(&self) -> f64;
    /// Seconds; 0 when unknown.
    fn duration(&self) -> f64;
    fn add_status_listener(&mut self, callback: StatusCallback) -> Self::Subscription;
    /// Release the handle and everything it holds.
    fn remove(self);
}

pub trait StatusSubscription {
    fn remove(self);
}
