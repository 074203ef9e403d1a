//! Message Store
//!
//! A single-slot observable cell holding the most recently received chat frame.
//! Observers are called once with the current value when they subscribe and
//! again every time the value changes.

use parking_lot::{ReentrantMutex, RwLock};
use std::sync::Arc;

type Observer = Arc<dyn Fn(&str) + Send + Sync>;

/// Internal store data
struct MessageStoreInner {
    value: String,
    next_id: u64,
    observers: Vec<(u64, Observer)>,
}

/// Thread-safe last-write-wins message cell
///
/// Cloning is cheap and every clone refers to the same cell, so the
/// composition root can hand one store to a connection manager and to any
/// number of UI components.
#[derive(Clone)]
pub struct MessageStore {
    inner: Arc<RwLock<MessageStoreInner>>,
    /// Held across a write and its notifications so observers see writes in order
    dispatch: Arc<ReentrantMutex<()>>,
}

impl MessageStore {
    /// Create a new store holding the empty string
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MessageStoreInner {
                value: String::new(),
                next_id: 0,
                observers: Vec::new(),
            })),
            dispatch: Arc::new(ReentrantMutex::new(())),
        }
    }

    /// Get the current value
    pub fn get(&self) -> String {
        self.inner.read().value.clone()
    }

    /// Overwrite the value and notify observers
    ///
    /// Returns `false` and notifies nobody when the new value equals the
    /// current one.
    pub fn set(&self, value: impl Into<String>) -> bool {
        let value = value.into();
        let _dispatch = self.dispatch.lock();
        let observers: Vec<Observer> = {
            let mut inner = self.inner.write();
            if inner.value == value {
                return false;
            }
            inner.value.clone_from(&value);
            inner.observers.iter().map(|(_, o)| o.clone()).collect()
        };

        // Observers run outside the value lock so they may read the store.
        for observer in observers {
            observer(&value);
        }
        true
    }

    /// Register an observer
    ///
    /// The observer is invoked immediately with the current value. Drop the
    /// returned [`Subscription`] or call [`Subscription::unsubscribe`] to stop
    /// receiving updates.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        let _dispatch = self.dispatch.lock();
        let (id, current) = {
            let mut inner = self.inner.write();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.observers.push((id, observer.clone()));
            (id, inner.value.clone())
        };

        observer(&current);

        Subscription {
            id,
            store: Some(self.clone()),
        }
    }

    /// Number of live observers
    pub fn observer_count(&self) -> usize {
        self.inner.read().observers.len()
    }

    fn remove(&self, id: u64) {
        self.inner.write().observers.retain(|(oid, _)| *oid != id);
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MessageStore")
            .field("value", &inner.value)
            .field("observers", &inner.observers.len())
            .finish()
    }
}

/// Handle returned by [`MessageStore::subscribe`]
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    id: u64,
    store: Option<MessageStore>,
}

impl Subscription {
    /// Stop receiving updates
    pub fn unsubscribe(mut self) {
        if let Some(store) = self.store.take() {
            store.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.take() {
            store.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |v: &str| sink.lock().push(v.to_string()))
    }

    #[test]
    fn test_initial_value_is_empty() {
        let store = MessageStore::new();
        assert_eq!(store.get(), "");
    }

    #[test]
    fn test_subscribe_receives_current_value_immediately() {
        let store = MessageStore::new();
        store.set("first");

        let (seen, observer) = recorder();
        let _sub = store.subscribe(observer);

        assert_eq!(*seen.lock(), vec!["first".to_string()]);
    }

    #[test]
    fn test_overwrite_notifies_and_replaces() {
        let store = MessageStore::new();
        let (seen, observer) = recorder();
        let _sub = store.subscribe(observer);

        assert!(store.set("a"));
        assert!(store.set("b"));

        assert_eq!(store.get(), "b");
        assert_eq!(*seen.lock(), vec!["", "a", "b"]);
    }

    #[test]
    fn test_same_value_does_not_notify() {
        let store = MessageStore::new();
        let (seen, observer) = recorder();
        let _sub = store.subscribe(observer);

        assert!(store.set("x"));
        assert!(!store.set("x"));

        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_updates() {
        let store = MessageStore::new();
        let (seen, observer) = recorder();
        let sub = store.subscribe(observer);
        assert_eq!(store.observer_count(), 1);

        sub.unsubscribe();
        store.set("after");

        assert_eq!(store.observer_count(), 0);
        assert_eq!(*seen.lock(), vec![""]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let store = MessageStore::new();
        {
            let _sub = store.subscribe(|_| {});
            assert_eq!(store.observer_count(), 1);
        }
        assert_eq!(store.observer_count(), 0);
    }

    #[test]
    fn test_late_subscriber_sees_only_latest() {
        let store = MessageStore::new();
        store.set("one");
        store.set("two");

        let (seen, observer) = recorder();
        let _sub = store.subscribe(observer);

        assert_eq!(*seen.lock(), vec!["two"]);
    }

    #[test]
    fn test_observer_can_read_store() {
        let store = MessageStore::new();
        let reader = store.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe(move |_| sink.lock().push(reader.get()));

        store.set("reentrant");

        assert_eq!(*seen.lock(), vec!["", "reentrant"]);
    }

    #[test]
    fn test_observer_can_write_store() {
        let store = MessageStore::new();
        let writer = store.clone();
        let (seen, observer) = recorder();
        let _sub = store.subscribe(observer);
        let _relay = store.subscribe(move |v| {
            if v == "ping" {
                writer.set("pong");
            }
        });

        store.set("ping");

        assert_eq!(store.get(), "pong");
        assert_eq!(seen.lock().last().map(String::as_str), Some("pong"));
    }

    #[test]
    fn test_concurrent_writes_are_observed_in_write_order() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let store = MessageStore::new();
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);

        let (seen, record) = recorder();
        let _sub = store.subscribe(move |v| {
            if v == "a" {
                entered_tx.lock().send(()).unwrap();
                release_rx.lock().recv().unwrap();
            }
            record(v);
        });

        let first = {
            let store = store.clone();
            thread::spawn(move || store.set("a"))
        };
        entered_rx.recv().unwrap();

        let second = {
            let store = store.clone();
            thread::spawn(move || store.set("b"))
        };
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        assert!(first.join().unwrap());
        assert!(second.join().unwrap());

        assert_eq!(store.get(), "b");
        assert_eq!(*seen.lock(), vec!["", "a", "b"]);
    }

    #[test]
    fn test_subscribe_during_dispatch_gets_latest_value_first() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let store = MessageStore::new();
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);

        let _blocker = store.subscribe(move |v| {
            if v == "a" {
                entered_tx.lock().send(()).unwrap();
                release_rx.lock().recv().unwrap();
            }
        });

        let writer = {
            let store = store.clone();
            thread::spawn(move || store.set("a"))
        };
        entered_rx.recv().unwrap();

        let subscriber = {
            let store = store.clone();
            thread::spawn(move || {
                let (seen, observer) = recorder();
                let sub = store.subscribe(observer);
                store.set("b");
                drop(sub);
                let seen = seen.lock().clone();
                seen
            })
        };
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        assert!(writer.join().unwrap());
        assert_eq!(subscriber.join().unwrap(), vec!["a", "b"]);
    }
}
