//! Observer primitives
//!
//! [`Event`] is a list of listeners with synchronous dispatch. [`Observable`]
//! pairs a current value with an [`Event`] fired whenever the value changes,
//! so collaborators can both read a snapshot and subscribe to updates.

use log::trace;
use std::sync::{Arc, Mutex, MutexGuard};

/// Handle returned by `add_listener`, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(ListenerId, Listener<T>)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A listener that panicked must not wedge every later dispatch
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A set of listeners notified synchronously on `dispatch`.
///
/// Cloning an `Event` yields another handle to the same listener set.
pub struct Event<T> {
    listeners: Arc<Mutex<Listeners<T>>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Event<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a listener
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut listeners = lock(&self.listeners);
        let id = ListenerId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry_id, _)| *entry_id != id);
        listeners.entries.len() != before
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    /// Call every listener with `value`, in registration order
    pub fn dispatch(&self, value: &T) {
        // Snapshot so listeners may add or remove listeners while running
        let snapshot: Vec<Listener<T>> = lock(&self.listeners)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        trace!("Dispatching to {} listeners", snapshot.len());
        for listener in snapshot {
            listener(value);
        }
    }
}

/// A value with change notification.
pub struct Observable<T> {
    value: Arc<Mutex<T>>,
    changed: Event<T>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            changed: self.changed.clone(),
        }
    }
}

impl<T: Clone> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial)),
            changed: Event::new(),
        }
    }

    /// Current value
    pub fn get(&self) -> T {
        lock(&self.value).clone()
    }

    /// Replace the value and notify listeners
    pub fn set(&self, value: T) {
        *lock(&self.value) = value.clone();
        self.changed.dispatch(&value);
    }

    /// Mutate the value in place and notify listeners
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        let value = {
            let mut guard = lock(&self.value);
            f(&mut guard);
            guard.clone()
        };
        self.changed.dispatch(&value);
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.changed.add_listener(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.changed.remove_listener(id)
    }
}

impl<T: Clone + PartialEq> Observable<T> {
    /// Replace the value, notifying only if it actually changed
    pub fn set_if_changed(&self, value: T) -> bool {
        {
            let mut guard = lock(&self.value);
            if *guard == value {
                return false;
            }
            *guard = value.clone();
        }
        self.changed.dispatch(&value);
        true
    }
}
