use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::observability;

/// A view that wants to hear about cache changes.
///
/// No payload is pushed: listeners re-query the scheduler for whatever
/// subset of data they display. Implementing the trait is the whole
/// contract — there is no runtime capability probe.
pub trait CacheListener: Send + Sync {
    fn on_change(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Handle returned by [`SubscriberRegistry::subscribe`]; keep it to
/// unsubscribe transient observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct RegistryInner {
    next_id: u64,
    // Registration order is the notification order.
    listeners: Vec<(SubscriptionId, Arc<dyn CacheListener>)>,
}

/// Broadcast registry decoupling the cache from its observers.
pub struct SubscriberRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_id: 0,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn CacheListener>) -> SubscriptionId {
        let mut inner = self.inner.lock().expect("subscriber registry poisoned");
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, listener));
        id
    }

    /// Returns false when the id was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().expect("subscriber registry poisoned");
        let before = inner.listeners.len();
        inner.listeners.retain(|(sid, _)| *sid != id);
        inner.listeners.len() != before
    }

    /// Notify every listener in registration order. A failing listener is
    /// logged and the rest still run; callers only invoke this after the
    /// triggering mutation is visible in the cache.
    pub fn notify_all(&self) {
        let listeners: Vec<(SubscriptionId, Arc<dyn CacheListener>)> = {
            let inner = self.inner.lock().expect("subscriber registry poisoned");
            inner.listeners.clone()
        };
        for (id, listener) in listeners {
            if let Err(e) = listener.on_change() {
                metrics::counter!(observability::NOTIFY_FAILURES_TOTAL).increment(1);
                warn!(subscription = id.0, "listener failed on notify: {e}");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("subscriber registry poisoned")
            .listeners
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
