//! The shared [`Store`] handle.
//!
//! Dispatches are serialized. A dispatch issued from inside a listener is
//! queued and applied by the outer dispatch after the current notification
//! round, so listeners always observe states in dispatch order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use tracing::debug;

use crate::state::{reduce, Action, StoreDefaults, StoreState};

type Listener = Arc<dyn Fn(&StoreState) + Send + Sync>;

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct StoreInner {
    state: Mutex<Arc<StoreState>>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_listener_id: AtomicU64,
    deferred: Mutex<VecDeque<Action>>,
    dispatching: Mutex<Option<ThreadId>>,
    gate: Mutex<()>,
}

impl StoreInner {
    fn remove_listener(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }
}

/// Clears the dispatching marker even if a listener panics.
struct DispatchGuard<'a> {
    dispatching: &'a Mutex<Option<ThreadId>>,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        *lock(self.dispatching) = None;
    }
}

// ============================================================================
// Store
// ============================================================================

/// Cloneable handle to the authoritative editor state.
///
/// Every clone refers to the same state and listener list.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state())
            .field("listeners", &lock(&self.inner.listeners).len())
            .finish_non_exhaustive()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreDefaults::default())
    }
}

impl Store {
    /// Creates a store holding the default state.
    #[must_use]
    pub fn new(defaults: StoreDefaults) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(Arc::new(StoreState::with_defaults(defaults))),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                deferred: Mutex::new(VecDeque::new()),
                dispatching: Mutex::new(None),
                gate: Mutex::new(()),
            }),
        }
    }

    /// Returns the current state snapshot.
    #[must_use]
    pub fn state(&self) -> Arc<StoreState> {
        Arc::clone(&lock(&self.inner.state))
    }

    /// Applies `action`, notifies listeners, and returns the resulting state.
    ///
    /// Malformed actions leave the state unchanged but still notify. When
    /// called from a listener the action is deferred and the current snapshot
    /// is returned.
    pub fn dispatch(&self, action: Action) -> Arc<StoreState> {
        let me = thread::current().id();
        if *lock(&self.inner.dispatching) == Some(me) {
            debug!(action = action.name(), "Deferring re-entrant dispatch");
            lock(&self.inner.deferred).push_back(action);
            return self.state();
        }

        let _gate = lock(&self.inner.gate);
        *lock(&self.inner.dispatching) = Some(me);
        let _guard = DispatchGuard {
            dispatching: &self.inner.dispatching,
        };

        let mut next = Some(action);
        let mut result = self.state();
        while let Some(action) = next {
            result = self.apply(action);
            self.notify(&result);
            next = lock(&self.inner.deferred).pop_front();
        }
        result
    }

    /// Restores the default state. Equivalent to dispatching [`Action::Reset`].
    pub fn reset(&self, defaults: StoreDefaults) -> Arc<StoreState> {
        self.dispatch(Action::Reset(defaults))
    }

    /// Registers a listener called after every dispatch, in registration order.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StoreState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.remove_listener(id)
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    fn apply(&self, action: Action) -> Arc<StoreState> {
        let name = action.name();
        let mut state = lock(&self.inner.state);
        match reduce(&state, action) {
            Some(next) => {
                *state = Arc::new(next);
            }
            None => {
                debug!(action = name, "Ignored malformed store action");
            }
        }
        Arc::clone(&state)
    }

    fn notify(&self, state: &StoreState) {
        let listeners: Vec<Listener> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle returned by [`Store::subscribe`].
///
/// Dropping it keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    store: Weak<StoreInner>,
}

impl Subscription {
    /// Returns the listener id.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes the listener. Returns `false` if the store is gone or the
    /// listener was already removed.
    pub fn unsubscribe(self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|inner| inner.remove_listener(self.id))
    }
}
