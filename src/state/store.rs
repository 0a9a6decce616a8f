use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::{PlaybackState, PlaybackUpdate};

/// Zero-argument callback run after every committed update.
pub type StateListener = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    state: Mutex<Arc<PlaybackState>>,
    listeners: Mutex<Vec<(u64, StateListener)>>,
    next_id: AtomicU64,
}

/// Owner of the process-wide `PlaybackState` plus its listener registry.
///
/// Cloning the store clones a handle to the same state, which is how the
/// engine thread and UI readers share it.
#[derive(Clone)]
pub struct PlaybackStateStore {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A listener that panicked must not wedge the store for everyone else.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PlaybackStateStore {
    pub fn new(initial: PlaybackState) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(Arc::new(initial)),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// The current state. Cheap: the queue is shared, not copied.
    pub fn snapshot(&self) -> Arc<PlaybackState> {
        lock(&self.inner.state).clone()
    }

    /// Register `listener`; it runs after every update until unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> StateSubscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        StateSubscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Merge `partial` into the state, then notify every listener once.
    ///
    /// Listeners run after the state lock is released and see the merged
    /// value; a listener removed during dispatch still runs for this cycle.
    pub(crate) fn update(&self, partial: PlaybackUpdate) {
        {
            let mut current = lock(&self.inner.state);
            let mut next = PlaybackState::clone(&current);
            partial.apply_to(&mut next);
            debug_assert!(next.holds_invariants(), "invalid playback state: {next:?}");
            *current = Arc::new(next);
        }

        let listeners: Vec<StateListener> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

impl Default for PlaybackStateStore {
    fn default() -> Self {
        Self::new(PlaybackState::default())
    }
}

/// Returned by `subscribe`; call `unsubscribe` to stop notifications.
///
/// Dropping it without unsubscribing keeps the listener registered.
pub struct StateSubscription {
    id: u64,
    store: Weak<Inner>,
}

impl StateSubscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.store.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}
