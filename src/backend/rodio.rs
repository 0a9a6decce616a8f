//! `AudioOutput` on top of `rodio`.
//!
//! Each handle is one `Sink` on the shared output stream. Status is produced
//! by a small ticker thread per subscription that samples the sink; natural
//! end is detected as the sink running dry while not paused.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use ::rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::{debug, warn};

use crate::error::BackendError;

use super::{AudioHandle, AudioOutput, PlaybackStatus, StatusCallback, StatusSubscription};

pub struct RodioOutput {
    stream: OutputStream,
    status_interval: Duration,
}

impl RodioOutput {
    /// Open the default output device. Must run on the thread that will own
    /// the engine: the stream is not necessarily `Send`.
    pub fn open_default(status_interval: Duration) -> Result<Self, BackendError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| BackendError::Output(e.to_string()))?;
        // rodio logs to stderr when the stream is dropped.
        stream.log_on_drop(false);
        Ok(Self {
            stream,
            status_interval,
        })
    }
}

impl AudioOutput for RodioOutput {
    type Handle = RodioHandle;

    fn configure(&mut self) -> Result<(), BackendError> {
        // The mixer needs no session setup; the stream is live once opened.
        Ok(())
    }

    fn create(&mut self, uri: &str) -> Result<RodioHandle, BackendError> {
        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        let mut handle = RodioHandle {
            shared: Arc::new(Shared {
                sink,
                loaded: Mutex::new(None),
                looping: AtomicBool::new(false),
                finished: AtomicBool::new(false),
            }),
            status_interval: self.status_interval,
        };
        handle.replace(uri)?;
        Ok(handle)
    }
}

/// Local paths and `file://` URLs are playable; anything else is not.
fn path_from_url(url: &str) -> Result<PathBuf, BackendError> {
    if let Some(rest) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if url.contains("://") {
        return Err(BackendError::UnsupportedUrl(url.to_string()));
    }
    Ok(PathBuf::from(url))
}

fn open_source(path: &Path) -> Result<Decoder<BufReader<File>>, BackendError> {
    let uri = path.display().to_string();
    let file = File::open(path).map_err(|source| BackendError::Open {
        uri: uri.clone(),
        source,
    })?;
    Decoder::new(BufReader::new(file)).map_err(|e| BackendError::Decode {
        uri,
        reason: e.to_string(),
    })
}

struct Loaded {
    path: PathBuf,
    duration: Option<Duration>,
}

struct Shared {
    sink: Sink,
    /// Also serialises source swaps against the ticker's end detection.
    loaded: Mutex<Option<Loaded>>,
    looping: AtomicBool,
    finished: AtomicBool,
}

fn lock(m: &Mutex<Option<Loaded>>) -> MutexGuard<'_, Option<Loaded>> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    /// Put the current file back into a drained sink.
    fn reappend(&self, loaded: &Loaded) -> Result<(), BackendError> {
        let source = open_source(&loaded.path)?;
        self.sink.append(source);
        Ok(())
    }

    fn sample(&self) -> PlaybackStatus {
        let loaded = lock(&self.loaded);
        let Some(current) = loaded.as_ref() else {
            return PlaybackStatus {
                current_time: 0.0,
                duration: None,
                playing: false,
                did_just_finish: false,
                is_loaded: false,
            };
        };

        let duration = current.duration.map(|d| d.as_secs_f64());
        let drained = self.sink.empty() && !self.sink.is_paused();
        let mut did_just_finish = false;

        if drained {
            if self.looping.load(Ordering::Acquire) {
                match self.reappend(current) {
                    Ok(()) => debug!(path = %current.path.display(), "looping track"),
                    Err(e) => {
                        warn!("failed to loop track: {e}");
                        did_just_finish = !self.finished.swap(true, Ordering::AcqRel);
                    }
                }
            } else {
                did_just_finish = !self.finished.swap(true, Ordering::AcqRel);
            }
        }

        let finished = self.finished.load(Ordering::Acquire);
        let current_time = if finished {
            duration.unwrap_or_else(|| self.sink.get_pos().as_secs_f64())
        } else {
            self.sink.get_pos().as_secs_f64()
        };

        PlaybackStatus {
            current_time,
            duration,
            playing: !self.sink.is_paused() && !self.sink.empty(),
            did_just_finish,
            is_loaded: true,
        }
    }
}

pub struct RodioHandle {
    shared: Arc<Shared>,
    status_interval: Duration,
}

impl AudioHandle for RodioHandle {
    type Subscription = RodioSubscription;

    fn replace(&mut self, uri: &str) -> Result<(), BackendError> {
        let path = path_from_url(uri)?;
        let source = open_source(&path)?;
        let duration = source.total_duration();

        let mut loaded = lock(&self.shared.loaded);
        let was_paused = self.shared.sink.is_paused();
        // `clear` drops the queued source and pauses the sink.
        self.shared.sink.clear();
        self.shared.sink.append(source);
        if !was_paused {
            self.shared.sink.play();
        }
        self.shared.finished.store(false, Ordering::Release);
        *loaded = Some(Loaded { path, duration });
        Ok(())
    }

    fn play(&mut self) {
        self.shared.sink.play();
    }

    fn pause(&mut self) {
        self.shared.sink.pause();
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), BackendError> {
        let loaded = lock(&self.shared.loaded);
        if self.shared.sink.empty() {
            // Ran to the end: bring the source back before seeking into it.
            if let Some(current) = loaded.as_ref() {
                self.shared.reappend(current)?;
            }
        }
        self.shared
            .sink
            .try_seek(Duration::from_secs_f64(seconds.max(0.0)))
            .map_err(|e| BackendError::Seek(e.to_string()))?;
        self.shared.finished.store(false, Ordering::Release);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.shared.sink.set_volume(volume);
    }

    fn set_loop(&mut self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Release);
    }

    fn current_time(&self) -> f64 {
        self.shared.sink.get_pos().as_secs_f64()
    }

    fn duration(&self) -> f64 {
        lock(&self.shared.loaded)
            .as_ref()
            .and_then(|l| l.duration)
            .map_or(0.0, |d| d.as_secs_f64())
    }

    fn add_status_listener(&mut self, callback: StatusCallback) -> RodioSubscription {
        let active = Arc::new(AtomicBool::new(true));
        let flag = active.clone();
        let shared = self.shared.clone();
        let interval = self.status_interval;

        thread::spawn(move || {
            while flag.load(Ordering::Acquire) {
                thread::sleep(interval);
                if !flag.load(Ordering::Acquire) {
                    break;
                }
                callback(shared.sample());
            }
        });

        RodioSubscription { active }
    }

    fn remove(self) {
        self.shared.sink.stop();
        *lock(&self.shared.loaded) = None;
    }
}

/// Stops the ticker thread on its next wake-up.
pub struct RodioSubscription {
    active: Arc<AtomicBool>,
}

impl StatusSubscription for RodioSubscription {
    fn remove(self) {
        self.active.store(false, Ordering::Release);
    }
}
