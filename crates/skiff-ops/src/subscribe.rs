//! Change listeners for pull-based renderers.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

/// Set of listeners notified after every change to an engine.
#[derive(Default)]
pub(crate) struct Listeners {
    registry: Arc<Mutex<Registry>>,
}

impl Listeners {
    pub(crate) fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, Arc::new(listener));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Call every listener once.
    ///
    /// Listeners run outside the lock so they may subscribe or unsubscribe.
    pub(crate) fn notify(&self) {
        let listeners: Vec<Listener> = self.registry.lock().listeners.values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("count", &self.len()).finish()
    }
}

/// Handle to a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().listeners.remove(&self.id);
        }
    }
}
