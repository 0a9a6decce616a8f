//! A single-track playback engine.
//!
//! `cadenza` keeps a queue of [`Track`]s, exactly one of which is bound to the
//! audio backend at a time. Transport verbs (play, pause, seek, skip, volume,
//! repeat) drive the backend and update a [`PlaybackStateStore`]; periodic
//! backend status is reconciled into that store, and a natural end of track
//! advances, repeats or stops according to the [`RepeatMode`].
//!
//! [`Engine`] is the synchronous core. [`Player`] runs it on its own thread
//! and is what applications hold.

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod library;
pub mod logging;
pub mod persist;
pub mod player;
pub mod runtime;
pub mod state;
pub mod track;

pub use engine::{Engine, EngineOptions, Phase};
pub use error::{BackendError, PlaybackError, Result};
pub use events::{EventBus, EventKind, ListenerHandle, PlayerEvent, PlayerState};
pub use player::Player;
pub use state::{PlaybackState, PlaybackStateStore, RepeatMode};
pub use track::{Track, TrackId, TrackMetadata};
