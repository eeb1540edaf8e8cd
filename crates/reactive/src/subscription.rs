//! Subscription management for observers.
//!
//! This module provides subscription IDs and a manager for tracking the
//! listeners of an observer. Observers keep the manager behind a lock and
//! call the listeners from a snapshot, so a listener may subscribe or
//! unsubscribe while being notified.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for notifications carrying an `E`.
pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A subscription to observer notifications.
pub struct Subscription<E: ?Sized> {
    /// Unique identifier
    id: SubscriptionId,
    /// Callback to invoke on notifications
    callback: Callback<E>,
    /// Whether this subscription is active
    active: bool,
}

impl<E: ?Sized> Subscription<E> {
    /// Creates a new subscription.
    pub fn new<F>(id: SubscriptionId, callback: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        Self {
            id,
            callback: Arc::new(callback),
            active: true,
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether this subscription is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Deactivates this subscription.
    #[inline]
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Notifies this subscription.
    pub fn notify(&self, event: &E) {
        if self.active {
            (self.callback)(event);
        }
    }
}

/// Manages the subscriptions of one observer.
pub struct SubscriptionManager<E: ?Sized> {
    /// Subscriptions in subscription order
    subscriptions: BTreeMap<SubscriptionId, Subscription<E>>,
    /// Next subscription ID to assign
    next_id: SubscriptionId,
}

impl<E: ?Sized> Default for SubscriptionManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> SubscriptionManager<E> {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Subscribes with the given callback.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.insert(id, Subscription::new(id, callback));
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Deactivates a subscription without removing it.
    pub fn deactivate(&mut self, id: SubscriptionId) -> bool {
        match self.subscriptions.get_mut(&id) {
            Some(sub) => {
                sub.deactivate();
                true
            }
            None => false,
        }
    }

    /// Notifies a specific subscription.
    pub fn notify(&self, id: SubscriptionId, event: &E) {
        if let Some(sub) = self.subscriptions.get(&id) {
            sub.notify(event);
        }
    }

    /// Notifies all active subscriptions in subscription order.
    pub fn notify_all(&self, event: &E) {
        for sub in self.subscriptions.values() {
            sub.notify(event);
        }
    }

    /// Callbacks of the active subscriptions, in subscription order.
    pub fn snapshot(&self) -> Vec<Callback<E>> {
        self.subscriptions
            .values()
            .filter(|sub| sub.active)
            .map(|sub| sub.callback.clone())
            .collect()
    }

    /// Returns the number of subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns all subscription IDs.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.keys().copied().collect()
    }

    /// Clears all subscriptions.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_subscription_new() {
        let sub: Subscription<i32> = Subscription::new(1, |_| {});
        assert_eq!(sub.id(), 1);
        assert!(sub.is_active());
    }

    #[test]
    fn test_subscription_notify_inactive() {
        let called = Arc::new(Mutex::new(false));
        let c = called.clone();

        let mut sub = Subscription::new(1, move |_: &i32| *c.lock() = true);
        sub.deactivate();
        sub.notify(&1);
        assert!(!*called.lock());
    }

    #[test]
    fn test_subscription_manager_subscribe() {
        let mut manager: SubscriptionManager<str> = SubscriptionManager::new();

        let id1 = manager.subscribe(|_| {});
        let id2 = manager.subscribe(|_| {});

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.subscription_ids(), vec![1, 2]);
    }

    #[test]
    fn test_subscription_manager_unsubscribe() {
        let mut manager: SubscriptionManager<i32> = SubscriptionManager::new();

        let id = manager.subscribe(|_| {});
        assert!(manager.unsubscribe(id));
        assert!(manager.is_empty());
        assert!(!manager.unsubscribe(id)); // Already removed
    }

    #[test]
    fn test_subscription_manager_notify_in_order() {
        let mut manager: SubscriptionManager<[i32]> = SubscriptionManager::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let s = seen.clone();
            manager.subscribe(move |batch: &[i32]| s.lock().push((tag, batch.len())));
        }
        manager.notify_all(&[1, 2, 3]);
        assert_eq!(*seen.lock(), vec![("first", 3), ("second", 3)]);

        seen.lock().clear();
        manager.notify(2, &[1]);
        assert_eq!(*seen.lock(), vec![("second", 1)]);
    }

    #[test]
    fn test_snapshot_skips_inactive() {
        let mut manager: SubscriptionManager<i32> = SubscriptionManager::new();
        let id = manager.subscribe(|_| {});
        manager.subscribe(|_| {});
        assert!(manager.deactivate(id));
        assert_eq!(manager.snapshot().len(), 1);

        manager.clear();
        assert!(manager.snapshot().is_empty());
    }
}
