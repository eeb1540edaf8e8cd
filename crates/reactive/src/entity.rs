//! Single-record observation.
//!
//! Entity observers wrap a list observer over a query expected to match at
//! most one record and report `EntityChange`s. A query matching more records,
//! or a batch with more than one change, is a misconfiguration: it is logged
//! as an error and only the first record or change is used.

use crate::background::BackgroundListObserver;
use crate::change::{EntityChange, ListChange};
use crate::collection::StreamCollection;
use crate::config::ObserverConfig;
use crate::list::ListObserver;
use crate::memoize::ReuseKey;
use crate::subscription::{SubscriptionId, SubscriptionManager};
use parking_lot::Mutex;
use ripple_core::{ConversionError, LiveQuery, Result};
use std::sync::Arc;
use tracing::error;

type EntityListeners<T> = Arc<Mutex<SubscriptionManager<EntityChange<Arc<T>>>>>;

/// Turns list batches into entity changes for `listeners`.
fn forward<T>(listeners: EntityListeners<T>, query: String) -> impl Fn(&[ListChange<Arc<T>>]) + Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    move |changes: &[ListChange<Arc<T>>]| {
        if changes.len() > 1 {
            error!(query = %query, changes = changes.len(), "entity observer received more than one change");
        }
        let Some(first) = changes.first() else {
            return;
        };
        let change = EntityChange::from(first.clone());
        let callbacks = listeners.lock().snapshot();
        for callback in callbacks {
            callback(&change);
        }
    }
}

/// Wraps `listener` so it only fires when the projected change differs from
/// the last one it received.
fn dedup<T, V, P, F>(projection: P, listener: F) -> impl Fn(&EntityChange<Arc<T>>) + Send + Sync + 'static
where
    T: Send + Sync + 'static,
    V: Clone + PartialEq + Send + 'static,
    P: Fn(&T) -> V + Send + Sync + 'static,
    F: Fn(&EntityChange<V>) + Send + Sync + 'static,
{
    let last: Mutex<Option<EntityChange<V>>> = Mutex::new(None);
    move |change: &EntityChange<Arc<T>>| {
        let projected = change.field_change(|item| projection(item.as_ref()));
        {
            let mut last = last.lock();
            if last.as_ref() == Some(&projected) {
                return;
            }
            *last = Some(projected.clone());
        }
        listener(&projected);
    }
}

fn first_item<T>(items: &StreamCollection<T>, query: &str) -> Option<Arc<T>> {
    if items.len() > 1 {
        error!(query = %query, matches = items.len(), "entity query matched more than one record");
    }
    items.first()
}

/// Observes one record on the query's context.
pub struct EntityObserver<L: LiveQuery, T> {
    list: ListObserver<L, T>,
    listeners: EntityListeners<T>,
}

impl<L, T> EntityObserver<L, T>
where
    L: LiveQuery,
    T: Send + Sync + 'static,
{
    /// Creates an idle observer.
    pub fn new<F>(query: Arc<L>, convert: F) -> Self
    where
        F: Fn(&L::Record) -> std::result::Result<T, ConversionError> + Send + Sync + 'static,
    {
        let list = ListObserver::new(query, convert, Vec::new());
        let listeners: EntityListeners<T> = Arc::new(Mutex::new(SubscriptionManager::new()));
        list.subscribe(forward(listeners.clone(), list.query().describe()));
        Self { list, listeners }
    }

    /// Reuses the prior item when its key matches the record's.
    pub fn with_reuse_key(self, key: ReuseKey<L::Record, T>) -> Self {
        Self {
            list: self.list.with_reuse_key(key),
            listeners: self.listeners,
        }
    }

    /// Fetches the record and starts observing.
    pub fn start_observing(&self) -> Result<()> {
        self.list.start()?;
        // Reports a query that matches several records.
        self.item();
        Ok(())
    }

    /// The observed item, if the query matches a record.
    pub fn item(&self) -> Option<Arc<T>> {
        first_item(&self.list.items(), &self.list.query().describe())
    }

    /// Adds a listener for whole-item changes.
    pub fn on_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&EntityChange<Arc<T>>) + Send + Sync + 'static,
    {
        self.listeners.lock().subscribe(listener)
    }

    /// Adds a listener for changes of one projected field. Consecutive equal
    /// projected changes are delivered once.
    pub fn on_field_change<V, P, F>(&self, projection: P, listener: F) -> SubscriptionId
    where
        V: Clone + PartialEq + Send + 'static,
        P: Fn(&T) -> V + Send + Sync + 'static,
        F: Fn(&EntityChange<V>) + Send + Sync + 'static,
    {
        self.listeners.lock().subscribe(dedup(projection, listener))
    }

    /// Removes a listener.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().unsubscribe(id)
    }

    pub fn is_observing(&self) -> bool {
        self.list.is_observing()
    }
}

/// Observes one record off the caller's thread.
///
/// If the record exists when observation starts, listeners receive a
/// `Create` for it on the delivery queue.
pub struct BackgroundEntityObserver<L: LiveQuery, T> {
    list: BackgroundListObserver<L, T>,
    listeners: EntityListeners<T>,
}

impl<L, T> BackgroundEntityObserver<L, T>
where
    L: LiveQuery,
    T: Send + Sync + 'static,
{
    /// Creates an idle observer with the default configuration.
    pub fn new<F>(query: Arc<L>, convert: F) -> Result<Self>
    where
        F: Fn(&L::Record) -> std::result::Result<T, ConversionError> + Send + Sync + 'static,
    {
        Self::with_config(query, convert, ObserverConfig::default())
    }

    /// Creates an idle observer.
    pub fn with_config<F>(query: Arc<L>, convert: F, config: ObserverConfig) -> Result<Self>
    where
        F: Fn(&L::Record) -> std::result::Result<T, ConversionError> + Send + Sync + 'static,
    {
        let list = BackgroundListObserver::with_config(query, convert, Vec::new(), config)?;
        let listeners: EntityListeners<T> = Arc::new(Mutex::new(SubscriptionManager::new()));
        list.subscribe(forward(listeners.clone(), list.query().describe()));
        Ok(Self { list, listeners })
    }

    /// Reuses the prior item when its key matches the record's.
    pub fn with_reuse_key(self, key: ReuseKey<L::Record, T>) -> Self {
        Self {
            list: self.list.with_reuse_key(key),
            listeners: self.listeners,
        }
    }

    /// Fetches the record and starts observing.
    pub fn start_observing(&self) -> Result<()> {
        self.list.start()?;
        // Reports a query that matches several records.
        self.item();
        Ok(())
    }

    /// The latest published item. Never blocks on the query's context.
    pub fn item(&self) -> Option<Arc<T>> {
        first_item(&self.list.items(), &self.list.query().describe())
    }

    /// Adds a listener for whole-item changes, called on the delivery queue.
    pub fn on_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&EntityChange<Arc<T>>) + Send + Sync + 'static,
    {
        self.listeners.lock().subscribe(listener)
    }

    /// Adds a deduplicating listener for one projected field.
    pub fn on_field_change<V, P, F>(&self, projection: P, listener: F) -> SubscriptionId
    where
        V: Clone + PartialEq + Send + 'static,
        P: Fn(&T) -> V + Send + Sync + 'static,
        F: Fn(&EntityChange<V>) + Send + Sync + 'static,
    {
        self.listeners.lock().subscribe(dedup(projection, listener))
    }

    /// Removes a listener.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().unsubscribe(id)
    }

    pub fn is_observing(&self) -> bool {
        self.list.is_observing()
    }

    /// Waits until pending changes have been delivered.
    pub fn flush(&self) {
        self.list.flush();
    }
}
