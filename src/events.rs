//! Discrete player events and the listener registry that fans them out.
//!
//! Unlike state snapshots, events describe transitions: playback started or
//! stopped, a backend failure happened, the active track changed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Transport state carried by `PlayerEvent::PlaybackState`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlayerState {
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Playing/paused/stopped transition.
    PlaybackState(PlayerState),
    /// A backend operation failed.
    PlaybackError(String),
    /// A new track became active (`None` once the queue is empty).
    ActiveTrackChanged(Option<usize>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    PlaybackState,
    PlaybackError,
    ActiveTrackChanged,
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PlaybackState(_) => EventKind::PlaybackState,
            Self::PlaybackError(_) => EventKind::PlaybackError,
            Self::ActiveTrackChanged(_) => EventKind::ActiveTrackChanged,
        }
    }
}

pub type EventListener = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

type Registry = HashMap<EventKind, Vec<(u64, EventListener)>>;

struct Inner {
    listeners: Mutex<Registry>,
    next_id: AtomicU64,
}

fn lock(m: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-kind listener sets. Clones share the same registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn add_event_listener<F>(&self, kind: EventKind, listener: F) -> ListenerHandle
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        ListenerHandle {
            id,
            kind,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to the listeners registered for its kind, in
    /// registration order. The registry lock is not held while they run.
    pub fn emit(&self, event: PlayerEvent) {
        let listeners: Vec<EventListener> = lock(&self.inner.listeners)
            .get(&event.kind())
            .map(|set| set.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        lock(&self.inner.listeners)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

/// Returned by `add_event_listener`.
pub struct ListenerHandle {
    id: u64,
    kind: EventKind,
    bus: Weak<Inner>,
}

impl ListenerHandle {
    /// Takes effect before the next dispatch.
    pub fn remove(self) {
        if let Some(inner) = self.bus.upgrade() {
            if let Some(set) = lock(&inner.listeners).get_mut(&self.kind) {
                set.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
