//! The engine on its own thread.
//!
//! `Player` is the handle the rest of the program holds. Every operation is a
//! command sent to the engine thread together with a reply channel; the call
//! blocks until the engine has finished the operation, so two calls from the
//! same caller never overlap. State reads go straight to the shared store.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::AudioOutput;
use crate::engine::{Engine, EngineOptions, Phase};
use crate::error::{BackendError, PlaybackError, Result};
use crate::events::{EventBus, EventKind, ListenerHandle, PlayerEvent};
use crate::state::{PlaybackState, PlaybackStateStore, RepeatMode, StateSubscription};
use crate::track::{Track, TrackMetadata};

type Reply<T> = Sender<T>;

enum Command {
    Setup(Reply<Result<()>>),
    SetQueue(Vec<Track>, Reply<Result<()>>),
    Add(Vec<Track>, Reply<Result<()>>),
    Remove(usize, Reply<Result<()>>),
    Reset(Reply<()>),
    UpdateMetadata(usize, TrackMetadata, Reply<Result<()>>),
    Play(Reply<Result<()>>),
    Pause(Reply<()>),
    Stop(Reply<Result<()>>),
    SeekTo(f64, Reply<Result<()>>),
    SkipToIndex(usize, Option<bool>, Reply<Result<()>>),
    SkipToNext(Reply<Result<()>>),
    SkipToPrevious(Reply<Result<()>>),
    SetVolume(f32, Reply<Result<()>>),
    SetRepeatMode(RepeatMode, Reply<()>),
    Phase(Reply<Phase>),
    Quit,
}

pub struct Player {
    tx: Sender<Command>,
    store: PlaybackStateStore,
    events: EventBus,
    engine_thread: ThreadId,
    join: Option<JoinHandle<()>>,
}

impl Player {
    /// Start the engine thread and build the audio output on it.
    ///
    /// Blocks until `make_output` has run; its error is returned as is. The
    /// output never leaves the engine thread, so it does not need to be
    /// `Send`.
    pub fn spawn<O, F>(make_output: F, options: EngineOptions, poll_interval: Duration) -> Result<Self>
    where
        O: AudioOutput + 'static,
        F: FnOnce() -> std::result::Result<O, BackendError> + Send + 'static,
    {
        let store = PlaybackStateStore::new(options.initial_state());
        let events = EventBus::new();
        let (tx, rx) = mpsc::channel();
        let (init_tx, init_rx) = mpsc::sync_channel(1);

        let thread_store = store.clone();
        let thread_events = events.clone();
        let join = thread::Builder::new()
            .name("cadenza-engine".to_string())
            .spawn(move || {
                let output = match make_output() {
                    Ok(output) => output,
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                let _ = init_tx.send(Ok(()));
                let engine = Engine::with_parts(output, thread_store, thread_events, &options);
                run(engine, rx, poll_interval);
            })
            .map_err(|e| BackendError::Output(format!("failed to spawn engine thread: {e}")))?;

        match init_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = join.join();
                return Err(e.into());
            }
            Err(_) => return Err(PlaybackError::Disconnected),
        }
        info!("engine thread started");

        Ok(Self {
            tx,
            store,
            events,
            engine_thread: join.thread().id(),
            join: Some(join),
        })
    }

    fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        if thread::current().id() == self.engine_thread {
            return Err(PlaybackError::Reentrant);
        }
        let (reply, response) = mpsc::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| PlaybackError::Disconnected)?;
        response.recv().map_err(|_| PlaybackError::Disconnected)
    }

    fn call(&self, make: impl FnOnce(Reply<Result<()>>) -> Command) -> Result<()> {
        self.request(make)?
    }

    pub fn setup(&self) -> Result<()> {
        self.call(Command::Setup)
    }

    pub fn set_queue(&self, tracks: Vec<Track>) -> Result<()> {
        self.call(|reply| Command::SetQueue(tracks, reply))
    }

    pub fn add(&self, tracks: impl IntoIterator<Item = Track>) -> Result<()> {
        let tracks: Vec<Track> = tracks.into_iter().collect();
        self.call(|reply| Command::Add(tracks, reply))
    }

    pub fn remove(&self, index: usize) -> Result<()> {
        self.call(|reply| Command::Remove(index, reply))
    }

    pub fn reset(&self) -> Result<()> {
        self.request(Command::Reset)
    }

    pub fn update_metadata_for_track(&self, index: usize, metadata: TrackMetadata) -> Result<()> {
        self.call(|reply| Command::UpdateMetadata(index, metadata, reply))
    }

    pub fn play(&self) -> Result<()> {
        self.call(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.request(Command::Pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.call(Command::Stop)
    }

    pub fn seek_to(&self, seconds: f64) -> Result<()> {
        self.call(|reply| Command::SeekTo(seconds, reply))
    }

    pub fn skip(&self, index: usize) -> Result<()> {
        self.skip_to_index(index, None)
    }

    pub fn skip_to_index(&self, index: usize, autoplay: Option<bool>) -> Result<()> {
        self.call(|reply| Command::SkipToIndex(index, autoplay, reply))
    }

    pub fn skip_to_next(&self) -> Result<()> {
        self.call(Command::SkipToNext)
    }

    pub fn skip_to_previous(&self) -> Result<()> {
        self.call(Command::SkipToPrevious)
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.call(|reply| Command::SetVolume(volume, reply))
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.request(|reply| Command::SetRepeatMode(mode, reply))
    }

    pub fn phase(&self) -> Result<Phase> {
        self.request(Command::Phase)
    }

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

    pub fn snapshot(&self) -> Arc<PlaybackState> {
        self.store.snapshot()
    }

    /// `listener` runs on the engine thread. Player commands issued from it
    /// fail with `PlaybackError::Reentrant` instead of waiting on the thread
    /// that is running them.
    pub fn subscribe<F>(&self, listener: F) -> StateSubscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    /// `listener` runs on the engine thread; see [`Player::subscribe`] for
    /// what that means for commands issued from it.
    pub fn add_event_listener<F>(&self, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.events.add_event_listener(kind, listener)
    }

    pub fn store(&self) -> &PlaybackStateStore {
        &self.store
    }

    /// Stop the engine thread and release the audio handle. Later calls
    /// fail with `PlaybackError::Disconnected`.
    pub fn shutdown(&mut self) {
        let _ = self.tx.send(Command::Quit);
        if thread::current().id() == self.engine_thread {
            // Dropped from a listener: the loop exits after this command.
            return;
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
            info!("engine thread stopped");
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<O: AudioOutput>(mut engine: Engine<O>, rx: Receiver<Command>, poll_interval: Duration) {
    loop {
        match rx.recv_timeout(poll_interval) {
            Ok(Command::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(cmd) => {
                // Status that arrived before the command belongs before it.
                engine.drain_status();
                execute(&mut engine, cmd);
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        engine.drain_status();
    }
    debug!("engine loop exiting");
    engine.teardown();
}

fn execute<O: AudioOutput>(engine: &mut Engine<O>, cmd: Command) {
    // A caller that gave up waiting is not an error for the engine.
    match cmd {
        Command::Setup(reply) => {
            let _ = reply.send(engine.setup());
        }
        Command::SetQueue(tracks, reply) => {
            let _ = reply.send(engine.set_queue(tracks));
        }
        Command::Add(tracks, reply) => {
            let _ = reply.send(engine.add(tracks));
        }
        Command::Remove(index, reply) => {
            let _ = reply.send(engine.remove(index));
        }
        Command::Reset(reply) => {
            engine.reset();
            let _ = reply.send(());
        }
        Command::UpdateMetadata(index, metadata, reply) => {
            let _ = reply.send(engine.update_metadata_for_track(index, metadata));
        }
        Command::Play(reply) => {
            let _ = reply.send(engine.play());
        }
        Command::Pause(reply) => {
            engine.pause();
            let _ = reply.send(());
        }
        Command::Stop(reply) => {
            let _ = reply.send(engine.stop());
        }
        Command::SeekTo(seconds, reply) => {
            let _ = reply.send(engine.seek_to(seconds));
        }
        Command::SkipToIndex(index, autoplay, reply) => {
            let _ = reply.send(engine.skip_to_index(index, autoplay));
        }
        Command::SkipToNext(reply) => {
            let _ = reply.send(engine.skip_to_next());
        }
        Command::SkipToPrevious(reply) => {
            let _ = reply.send(engine.skip_to_previous());
        }
        Command::SetVolume(volume, reply) => {
            let _ = reply.send(engine.set_volume(volume));
        }
        Command::SetRepeatMode(mode, reply) => {
            engine.set_repeat_mode(mode);
            let _ = reply.send(());
        }
        Command::Phase(reply) => {
            let _ = reply.send(engine.phase());
        }
        Command::Quit => {}
    }
}
