use std::sync::mpsc::Sender;

use tracing::debug;

use crate::error::BackendError;
use crate::track::Track;

use super::{AudioHandle, AudioOutput, StatusEvent, StatusSubscription};

type SubscriptionOf<O> = <<O as AudioOutput>::Handle as AudioHandle>::Subscription;

/// Sole owner of the native handle.
///
/// At most one status subscription is alive at any time (`subscription` is an
/// `Option`, and `load` removes the old one before attaching the next). Every
/// load and every dispose bumps `generation`, so payloads still in flight from
/// a superseded handle can be recognised and dropped by the engine.
pub struct AudioBackendAdapter<O: AudioOutput> {
    output: O,
    handle: Option<O::Handle>,
    subscription: Option<SubscriptionOf<O>>,
    generation: u64,
    status_tx: Sender<StatusEvent>,
}

impl<O: AudioOutput> AudioBackendAdapter<O> {
    pub fn new(output: O, status_tx: Sender<StatusEvent>) -> Self {
        Self {
            output,
            handle: None,
            subscription: None,
            generation: 0,
            status_tx,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    pub fn configure(&mut self) -> Result<(), BackendError> {
        self.output.configure()
    }

    /// Bind the handle to `track`, creating it on first use and replacing its
    /// source afterwards. Returns the generation of the new status stream.
    ///
    /// On failure the handle is released: a handle still holding the previous
    /// track must not keep playing under the new index.
    pub fn load(&mut self, track: &Track, volume: f32, looping: bool) -> Result<u64, BackendError> {
        self.detach();
        self.generation += 1;
        let generation = self.generation;

        let handle = match self.handle.take() {
            Some(mut handle) => match handle.replace(&track.url) {
                Ok(()) => handle,
                Err(e) => {
                    handle.remove();
                    return Err(e);
                }
            },
            None => self.output.create(&track.url)?,
        };
        let handle = self.handle.insert(handle);

        handle.set_volume(volume);
        handle.set_loop(looping);

        let tx = self.status_tx.clone();
        let subscription = handle.add_status_listener(Box::new(move |status| {
            // The engine side may already be gone during teardown.
            let _ = tx.send(StatusEvent { generation, status });
        }));
        self.subscription = Some(subscription);

        debug!(generation, url = %track.url, "loaded track");
        Ok(generation)
    }

    pub fn play(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.play();
        }
    }

    pub fn pause(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.pause();
        }
    }

    /// No handle means nothing to seek: that is not an error.
    pub fn seek_to(&mut self, seconds: f64) -> Result<(), BackendError> {
        match self.handle.as_mut() {
            Some(handle) => handle.seek_to(seconds),
            None => Ok(()),
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        if let Some(handle) = self.handle.as_mut() {
            handle.set_volume(volume);
        }
    }

    pub fn set_loop_single_track(&mut self, looping: bool) {
        if let Some(handle) = self.handle.as_mut() {
            handle.set_loop(looping);
        }
    }

    pub fn current_time(&self) -> f64 {
        self.handle.as_ref().map_or(0.0, |h| h.current_time())
    }

    pub fn duration(&self) -> f64 {
        self.handle.as_ref().map_or(0.0, |h| h.duration())
    }

    /// Remove the subscription and release the handle.
    pub fn dispose(&mut self) {
        self.detach();
        if let Some(handle) = self.handle.take() {
            handle.remove();
            self.generation += 1;
            debug!(generation = self.generation, "disposed audio handle");
        }
    }

    fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.remove();
        }
    }

    #[cfg(test)]
    pub(crate) fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }
}

impl<O: AudioOutput> Drop for AudioBackendAdapter<O> {
    fn drop(&mut self) {
        self.dispose();
    }
}
