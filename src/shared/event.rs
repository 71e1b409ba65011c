//! Listener Fan-out
//!
//! Synchronous subscriber lists used for connectivity changes and sync status
//! updates. Notifications run on the caller's thread, in subscription order,
//! with no batching.
//!
//! Callbacks are cloned out of the lock before they run, so a callback may
//! subscribe or unsubscribe without deadlocking.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    callback: Callback<T>,
}

struct Inner<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

/// Ordered list of subscribers for events of type `T`
pub struct Listeners<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: 'static> Listeners<T> {
    /// Create an empty listener list
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a callback; keep the returned handle to unsubscribe later
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push(Entry {
            id,
            callback: Arc::new(callback),
        });

        let weak: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    lock(&inner).entries.retain(|entry| entry.id != id);
                }
            })),
        }
    }

    /// Invoke every current subscriber with `event`
    pub fn notify(&self, event: &T) {
        let callbacks: Vec<Callback<T>> = lock(&self.inner)
            .entries
            .iter()
            .map(|entry| Arc::clone(&entry.callback))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &lock(&self.inner).entries.len())
            .finish()
    }
}

/// Handle returned by `subscribe`
///
/// Dropping the handle does NOT unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the callback from its listener list
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking subscriber must not take the whole fan-out down with it.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
