// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notification for robot snapshots.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Unique identifier for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub Uuid);

impl SubscriberId {
    /// Create a new random subscriber ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A callback and the newest revision it has been handed
struct Entry<S> {
    callback: Box<dyn Fn(&S) + Send + Sync>,
    delivered: AtomicU64,
}

type Registry<S> = Mutex<IndexMap<SubscriberId, Arc<Entry<S>>>>;

/// Set of callbacks invoked with every published snapshot
pub struct Subscribers<S> {
    registry: Arc<Registry<S>>,
}

impl<S: 'static> Subscribers<S> {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(IndexMap::new())),
        }
    }

    /// Register a callback; it stays registered until the returned handle is dropped
    pub fn subscribe(&self, on_change: impl Fn(&S) + Send + Sync + 'static) -> Subscription {
        let id = SubscriberId::new();
        let entry = Entry {
            callback: Box::new(on_change),
            delivered: AtomicU64::new(0),
        };
        self.registry.lock().insert(id, Arc::new(entry));

        let registry: Weak<Registry<S>> = Arc::downgrade(&self.registry);
        Subscription {
            id,
            unsubscribe: Some(Box::new(move |id| {
                if let Some(registry) = registry.upgrade() {
                    registry.lock().shift_remove(&id);
                }
            })),
        }
    }

    /// Invoke every callback in subscription order.
    ///
    /// Callbacks are cloned out first so they may read the robot or subscribe
    /// again without deadlocking. A callback that has already been handed a
    /// newer revision skips this one, so a publish that loses a race with a
    /// later one never reaches a subscriber after it.
    pub fn notify(&self, revision: u64, snapshot: &S) {
        let entries: Vec<Arc<Entry<S>>> = self.registry.lock().values().cloned().collect();
        for entry in entries {
            if entry.delivered.fetch_max(revision, Ordering::AcqRel) >= revision {
                tracing::trace!("Skipped stale revision {revision}");
                continue;
            }
            (entry.callback)(snapshot);
        }
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    /// Whether nobody is subscribed
    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }
}

impl<S: 'static> Default for Subscribers<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by `subscribe`; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    unsubscribe: Option<Box<dyn FnOnce(SubscriberId) + Send + Sync>>,
}

impl Subscription {
    /// Get the subscription ID
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Keep the callback registered for the lifetime of the robot
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_in_order() {
        let subscribers = Subscribers::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = {
            let seen = Arc::clone(&seen);
            subscribers.subscribe(move |v| seen.lock().push(("a", *v)))
        };
        let b = {
            let seen = Arc::clone(&seen);
            subscribers.subscribe(move |v| seen.lock().push(("b", *v)))
        };

        subscribers.notify(1, &7);
        assert_eq!(*seen.lock(), vec![("a", 7), ("b", 7)]);
        drop((a, b));
    }

    #[test]
    fn test_older_revision_is_skipped() {
        let subscribers = Subscribers::<&str>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        subscribers.subscribe(move |v| sink.lock().push(*v)).detach();

        subscribers.notify(5, &"reset");
        subscribers.notify(4, &"lowering");
        subscribers.notify(5, &"reset again");
        subscribers.notify(6, &"powered");
        assert_eq!(*seen.lock(), vec!["reset", "powered"]);
    }

    #[test]
    fn test_late_subscriber_gets_next_revision() {
        let subscribers = Subscribers::<u32>::new();
        subscribers.notify(3, &3);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        subscribers.subscribe(move |v| sink.lock().push(*v)).detach();
        subscribers.notify(4, &4);
        assert_eq!(*seen.lock(), vec![4]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let subscribers = Subscribers::<u32>::new();
        let sub = subscribers.subscribe(|_| {});
        assert_eq!(subscribers.len(), 1);
        drop(sub);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn test_detach_keeps_callback() {
        let subscribers = Subscribers::<u32>::new();
        subscribers.subscribe(|_| {}).detach();
        assert_eq!(subscribers.len(), 1);
    }
}
