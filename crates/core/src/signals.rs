//! Store-scoped bulk teardown signals.
//!
//! Each execution context owns one `StoreSignals` hub. Handlers are invoked
//! synchronously on the publishing thread in subscription order.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Unique identifier for a signal subscription.
pub type SignalToken = u64;

/// A store-wide lifecycle signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreSignal {
    /// All data is about to be erased. Records are still readable.
    WillRemoveAllData,
    /// All data has been erased.
    DidRemoveAllData,
}

type SignalHandler = Arc<dyn Fn(StoreSignal) + Send + Sync>;

/// Publish/subscribe hub for [`StoreSignal`]s.
pub struct StoreSignals {
    handlers: RwLock<BTreeMap<SignalToken, SignalHandler>>,
    next_token: AtomicU64,
}

impl Default for StoreSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreSignals {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(BTreeMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Registers a handler and returns its token.
    pub fn subscribe<F>(&self, handler: F) -> SignalToken
    where
        F: Fn(StoreSignal) + Send + Sync + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().insert(token, Arc::new(handler));
        token
    }

    /// Removes a handler. Returns true if it was registered.
    pub fn unsubscribe(&self, token: SignalToken) -> bool {
        self.handlers.write().remove(&token).is_some()
    }

    /// Delivers a signal to every handler.
    ///
    /// The handler list is snapshotted first, so handlers may subscribe or
    /// unsubscribe while being called.
    pub fn publish(&self, signal: StoreSignal) {
        let handlers: Vec<SignalHandler> = self.handlers.read().values().cloned().collect();
        trace!(?signal, handlers = handlers.len(), "publishing store signal");
        for handler in handlers {
            handler(signal);
        }
    }

    /// Returns the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns true if there are no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_subscribe_and_publish() {
        let hub = StoreSignals::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        hub.subscribe(move |signal| seen_clone.lock().push(signal));
        hub.publish(StoreSignal::WillRemoveAllData);
        hub.publish(StoreSignal::DidRemoveAllData);

        assert_eq!(
            *seen.lock(),
            vec![StoreSignal::WillRemoveAllData, StoreSignal::DidRemoveAllData]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let hub = StoreSignals::new();
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();

        let token = hub.subscribe(move |_| *count_clone.lock() += 1);
        assert_eq!(hub.len(), 1);
        assert!(hub.unsubscribe(token));
        assert!(!hub.unsubscribe(token));
        assert!(hub.is_empty());

        hub.publish(StoreSignal::WillRemoveAllData);
        assert_eq!(*count.lock(), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself() {
        let hub = Arc::new(StoreSignals::new());
        let token = Arc::new(Mutex::new(None));
        let hub_clone = hub.clone();
        let token_clone = token.clone();

        let id = hub.subscribe(move |_| {
            if let Some(id) = *token_clone.lock() {
                hub_clone.unsubscribe(id);
            }
        });
        *token.lock() = Some(id);

        hub.publish(StoreSignal::DidRemoveAllData);
        assert!(hub.is_empty());
    }
}
