//! Listener registry shared by the connection manager and the preference store
//!
//! Subscribers are keyed by the handle returned on registration, so removing
//! one never touches another subscriber that happens to share a callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Handle returned by `add_listener`, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Ordered list of callbacks for events of type `E`
pub struct Listeners<E> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Callback<E>)>>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback; returns its handle
    pub fn add<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(callback)));
        id
    }

    /// Unregister by handle. Returns false if the handle was unknown.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Call every listener in registration order.
    ///
    /// The list is copied first and no lock is held while callbacks run, so a
    /// callback may register or unregister listeners (the change applies to the
    /// next emit).
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = self.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for callback in snapshot {
            callback(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Callback<E>)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_in_registration_order() {
        let listeners: Listeners<u32> = Listeners::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            listeners.add(move |value: &u32| seen.lock().unwrap().push(format!("{}{}", tag, value)));
        }

        listeners.emit(&1);
        assert_eq!(*seen.lock().unwrap(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn remove_by_handle_keeps_identical_callbacks() {
        let listeners: Listeners<()> = Listeners::new();
        let count = Arc::new(AtomicU64::new(0));

        let make = |count: Arc<AtomicU64>| move |_: &()| {
            count.fetch_add(1, Ordering::SeqCst);
        };
        let first = listeners.add(make(Arc::clone(&count)));
        let _second = listeners.add(make(Arc::clone(&count)));

        assert!(listeners.remove(first));
        assert!(!listeners.remove(first));

        listeners.emit(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn callback_may_unregister_itself() {
        let listeners: Arc<Listeners<()>> = Arc::new(Listeners::new());
        let own_id = Arc::new(Mutex::new(None));

        let id = {
            let registry = Arc::clone(&listeners);
            let own_id = Arc::clone(&own_id);
            listeners.add(move |_: &()| {
                if let Some(id) = *own_id.lock().unwrap() {
                    registry.remove(id);
                }
            })
        };
        *own_id.lock().unwrap() = Some(id);

        listeners.emit(&());
        assert!(listeners.is_empty());
    }
}
