//! Scripted backend for tests: records every call and lets the test push
//! status payloads through the registered listeners.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::BackendError;

use super::{AudioHandle, AudioOutput, PlaybackStatus, StatusCallback, StatusSubscription};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Configure,
    Create(String),
    Replace(String),
    Play,
    Pause,
    SeekTo(f64),
    SetVolume(f32),
    SetLoop(bool),
    AddListener(usize),
    RemoveListener(usize),
    RemoveHandle,
}

struct Listener {
    callback: StatusCallback,
    live: bool,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    listeners: Vec<Listener>,
    fail_next_load: bool,
    fail_next_seek: bool,
    duration: f64,
}

#[derive(Clone, Default)]
pub(crate) struct FakeOutput {
    state: Arc<Mutex<State>>,
}

impl FakeOutput {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub(crate) fn fail_next_load(&self) {
        self.lock().fail_next_load = true;
    }

    pub(crate) fn fail_next_seek(&self) {
        self.lock().fail_next_seek = true;
    }

    /// Duration reported by handles right after a load.
    pub(crate) fn set_duration(&self, seconds: f64) {
        self.lock().duration = seconds;
    }

    pub(crate) fn live_listeners(&self) -> usize {
        self.lock().listeners.iter().filter(|l| l.live).count()
    }

    /// Deliver through the most recently added listener that is still live.
    pub(crate) fn emit(&self, status: PlaybackStatus) {
        let state = self.lock();
        if let Some(l) = state.listeners.iter().rev().find(|l| l.live) {
            (l.callback)(status);
        }
    }

    /// Deliver through listener `index` even if it was removed, the way a
    /// backend tick racing a reload would.
    pub(crate) fn emit_on(&self, index: usize, status: PlaybackStatus) {
        let state = self.lock();
        (state.listeners[index].callback)(status);
    }

    fn load(&self, call: Call) -> Result<(), BackendError> {
        let mut state = self.lock();
        let uri = match &call {
            Call::Create(u) | Call::Replace(u) => u.clone(),
            _ => String::new(),
        };
        state.calls.push(call);
        if std::mem::take(&mut state.fail_next_load) {
            return Err(BackendError::Decode {
                uri,
                reason: "scripted failure".into(),
            });
        }
        Ok(())
    }
}

impl AudioOutput for FakeOutput {
    type Handle = FakeHandle;

    fn configure(&mut self) -> Result<(), BackendError> {
        self.lock().calls.push(Call::Configure);
        Ok(())
    }

    fn create(&mut self, uri: &str) -> Result<FakeHandle, BackendError> {
        self.load(Call::Create(uri.to_string()))?;
        Ok(FakeHandle {
            output: self.clone(),
        })
    }
}

pub(crate) struct FakeHandle {
    output: FakeOutput,
}

impl FakeHandle {
    fn record(&self, call: Call) {
        self.output.lock().calls.push(call);
    }
}

impl AudioHandle for FakeHandle {
    type Subscription = FakeSubscription;

    fn replace(&mut self, uri: &str) -> Result<(), BackendError> {
        self.output.load(Call::Replace(uri.to_string()))
    }

    fn play(&mut self) {
        self.record(Call::Play);
    }

    fn pause(&mut self) {
        self.record(Call::Pause);
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), BackendError> {
        let mut state = self.output.lock();
        state.calls.push(Call::SeekTo(seconds));
        if std::mem::take(&mut state.fail_next_seek) {
            return Err(BackendError::Seek("scripted failure".into()));
        }
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.record(Call::SetVolume(volume));
    }

    fn set_loop(&mut self, looping: bool) {
        self.record(Call::SetLoop(looping));
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn duration(&self) -> f64 {
        self.output.lock().duration
    }

    fn add_status_listener(&mut self, callback: StatusCallback) -> FakeSubscription {
        let mut state = self.output.lock();
        let index = state.listeners.len();
        state.listeners.push(Listener {
            callback,
            live: true,
        });
        state.calls.push(Call::AddListener(index));
        FakeSubscription {
            output: self.output.clone(),
            index,
        }
    }

    fn remove(self) {
        self.record(Call::RemoveHandle);
    }
}

pub(crate) struct FakeSubscription {
    output: FakeOutput,
    index: usize,
}

impl StatusSubscription for FakeSubscription {
    fn remove(self) {
        let mut state = self.output.lock();
        state.listeners[self.index].live = false;
        state.calls.push(Call::RemoveListener(self.index));
    }
}
