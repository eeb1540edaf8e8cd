//! Bulk removal handling.
//!
//! When the store erases all data it does not report per-record deletions.
//! `BulkRemovalBridge` listens for the store's teardown signals on one
//! execution context and forwards them to an observer, which turns the
//! erase into ordinary removals.

use ripple_core::{ExecutionContext, SignalToken, StoreSignal};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Receives bulk removal notifications on the observer's context.
pub trait BulkRemovalTarget: Send + Sync + 'static {
    /// All data is about to be erased; records are still readable. The target
    /// reports a removal for every fetched record, clears its items, then
    /// detaches from its live query.
    fn will_remove_all_data(&self);

    /// All data has been erased. The target refetches and reattaches.
    fn did_remove_all_data(&self);
}

/// Subscription of one target to a context's teardown signals.
///
/// Dropping the bridge unsubscribes.
pub struct BulkRemovalBridge {
    context: Weak<dyn ExecutionContext>,
    token: SignalToken,
}

impl BulkRemovalBridge {
    /// Subscribes `target` to the teardown signals of `context`. Signals are
    /// handed to the target through `context.perform`, so they are serialized
    /// with the live query's own events.
    pub fn attach(context: &Arc<dyn ExecutionContext>, target: Weak<dyn BulkRemovalTarget>) -> Self {
        let weak_context = Arc::downgrade(context);
        let token = context.signals().subscribe(move |signal| {
            let (Some(target), Some(context)) = (target.upgrade(), weak_context.upgrade()) else {
                return;
            };
            debug!(?signal, context = context.label(), "bulk removal signal");
            context.perform(Box::new(move || match signal {
                StoreSignal::WillRemoveAllData => target.will_remove_all_data(),
                StoreSignal::DidRemoveAllData => target.did_remove_all_data(),
            }));
        });

        Self {
            context: Arc::downgrade(context),
            token,
        }
    }

    /// The signal subscription token.
    pub fn token(&self) -> SignalToken {
        self.token
    }
}

impl Drop for BulkRemovalBridge {
    fn drop(&mut self) {
        if let Some(context) = self.context.upgrade() {
            context.signals().unsubscribe(self.token);
        }
    }
}

impl fmt::Debug for BulkRemovalBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkRemovalBridge")
            .field("token", &self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use ripple_storage::Context;

    #[derive(Default)]
    struct Target {
        seen: Mutex<Vec<&'static str>>,
    }

    impl BulkRemovalTarget for Target {
        fn will_remove_all_data(&self) {
            self.seen.lock().push("will");
        }

        fn did_remove_all_data(&self) {
            self.seen.lock().push("did");
        }
    }

    fn context() -> Arc<dyn ExecutionContext> {
        Arc::new(Context::immediate("view"))
    }

    #[test]
    fn test_forwards_signals_in_order() {
        let context = context();
        let target = Arc::new(Target::default());
        let as_target: Arc<dyn BulkRemovalTarget> = target.clone();
        let _bridge = BulkRemovalBridge::attach(&context, Arc::downgrade(&as_target));

        context.signals().publish(StoreSignal::WillRemoveAllData);
        context.signals().publish(StoreSignal::DidRemoveAllData);
        assert_eq!(*target.seen.lock(), vec!["will", "did"]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let context = context();
        let target: Arc<dyn BulkRemovalTarget> = Arc::new(Target::default());
        let bridge = BulkRemovalBridge::attach(&context, Arc::downgrade(&target));
        assert_eq!(context.signals().len(), 1);

        drop(bridge);
        assert!(context.signals().is_empty());
    }

    #[test]
    fn test_released_target_is_ignored() {
        let context = context();
        let target: Arc<dyn BulkRemovalTarget> = Arc::new(Target::default());
        let _bridge = BulkRemovalBridge::attach(&context, Arc::downgrade(&target));
        drop(target);

        context.signals().publish(StoreSignal::WillRemoveAllData);
    }
}
