//! Background list observation.
//!
//! A `BackgroundListObserver` materializes on the live query's context,
//! normally the store's background context, and calls its listeners on a
//! dedicated serial queue. The current collection is published through an
//! `ArcSwap`, so `items()` never waits for either thread.

use crate::aggregator::ConvertFn;
use crate::change::ListChange;
use crate::collection::StreamCollection;
use crate::config::ObserverConfig;
use crate::memoize::ReuseKey;
use crate::observer::{Delivery, ObserverCore, ObserverState};
use crate::sort::SortValue;
use crate::subscription::{SubscriptionId, SubscriptionManager};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use ripple_core::{ConversionError, LiveQuery, Result, SerialQueue};
use std::sync::Arc;
use tracing::{trace, warn};

type Listeners<E> = Arc<Mutex<SubscriptionManager<E>>>;

pub(crate) struct QueuedDelivery<T> {
    config: ObserverConfig,
    current: ArcSwap<StreamCollection<T>>,
    queue: SerialQueue,
    listeners: Listeners<[ListChange<Arc<T>>]>,
    collection_listeners: Listeners<StreamCollection<T>>,
    will_change: Listeners<()>,
}

impl<T: Send + Sync + 'static> QueuedDelivery<T> {
    fn new(config: ObserverConfig) -> Result<Self> {
        Ok(Self {
            queue: SerialQueue::new(config.queue_label.clone())?,
            config,
            current: ArcSwap::from_pointee(StreamCollection::empty()),
            listeners: Arc::new(Mutex::new(SubscriptionManager::new())),
            collection_listeners: Arc::new(Mutex::new(SubscriptionManager::new())),
            will_change: Arc::new(Mutex::new(SubscriptionManager::new())),
        })
    }

    fn items(&self) -> StreamCollection<T> {
        StreamCollection::clone(&self.current.load())
    }

    fn publish(&self, changes: Vec<ListChange<Arc<T>>>, collection: StreamCollection<T>) {
        self.current.store(Arc::new(collection.clone()));

        let listeners = self.listeners.clone();
        let collection_listeners = self.collection_listeners.clone();
        let dispatched = self.queue.dispatch(Box::new(move || {
            trace!(changes = changes.len(), "calling listeners");
            let callbacks = listeners.lock().snapshot();
            for callback in callbacks {
                callback(&changes);
            }
            let callbacks = collection_listeners.lock().snapshot();
            for callback in callbacks {
                callback(&collection);
            }
        }));
        if let Err(e) = dispatched {
            warn!(queue = %self.config.queue_label, error = %e, "dropping batch");
        }
    }
}

impl<T: Send + Sync + 'static> Delivery<T> for QueuedDelivery<T> {
    fn will_change(&self) {
        let listeners = self.will_change.clone();
        let dispatched = self.queue.dispatch(Box::new(move || {
            let callbacks = listeners.lock().snapshot();
            for callback in callbacks {
                callback(&());
            }
        }));
        if let Err(e) = dispatched {
            warn!(queue = %self.config.queue_label, error = %e, "dropping will-change notification");
        }
    }

    fn initial(&self, changes: Vec<ListChange<Arc<T>>>, collection: StreamCollection<T>) {
        if self.config.deliver_initial && !changes.is_empty() {
            self.publish(changes, collection);
        } else {
            self.current.store(Arc::new(collection));
        }
    }

    fn deliver(&self, changes: Vec<ListChange<Arc<T>>>, collection: StreamCollection<T>) {
        self.publish(changes, collection);
    }
}

/// Observes an ordered query off the caller's thread.
pub struct BackgroundListObserver<L: LiveQuery, T> {
    core: Arc<ObserverCore<L, T, QueuedDelivery<T>>>,
}

impl<L, T> BackgroundListObserver<L, T>
where
    L: LiveQuery,
    T: Send + Sync + 'static,
{
    /// Creates an idle observer with the default configuration.
    pub fn new<F>(query: Arc<L>, convert: F, sorting: Vec<SortValue<T>>) -> Result<Self>
    where
        F: Fn(&L::Record) -> std::result::Result<T, ConversionError> + Send + Sync + 'static,
    {
        Self::with_config(query, convert, sorting, ObserverConfig::default())
    }

    /// Creates an idle observer. Spawns the delivery thread.
    pub fn with_config<F>(query: Arc<L>, convert: F, sorting: Vec<SortValue<T>>, config: ObserverConfig) -> Result<Self>
    where
        F: Fn(&L::Record) -> std::result::Result<T, ConversionError> + Send + Sync + 'static,
    {
        let convert: ConvertFn<L::Record, T> = Arc::new(convert);
        let delivery = QueuedDelivery::new(config)?;
        Ok(Self {
            core: ObserverCore::new(query, convert, sorting, delivery),
        })
    }

    /// Reuses prior items whose keys match the record's.
    pub fn with_reuse_key(self, key: ReuseKey<L::Record, T>) -> Self {
        self.core.set_reuse_key(key);
        self
    }

    /// Starts observing and subscribes `on_change`.
    ///
    /// The fetch runs synchronously on the query's context. The initial
    /// collection is then delivered asynchronously as a batch of inserts,
    /// unless the configuration turns that off.
    pub fn start_observing<F>(&self, on_change: F) -> Result<()>
    where
        F: Fn(&[ListChange<Arc<T>>]) + Send + Sync + 'static,
    {
        let id = self.subscribe(on_change);
        self.start().map_err(|e| {
            self.unsubscribe(id);
            e
        })
    }

    /// Starts observing without adding a listener.
    pub fn start(&self) -> Result<()> {
        self.core.start()
    }

    /// Adds a batch listener.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&[ListChange<Arc<T>>]) + Send + Sync + 'static,
    {
        self.core.delivery.listeners.lock().subscribe(listener)
    }

    /// Adds a listener that only receives the new collection.
    pub fn subscribe_collection<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StreamCollection<T>) + Send + Sync + 'static,
    {
        self.core
            .delivery
            .collection_listeners
            .lock()
            .subscribe(listener)
    }

    /// Removes a listener added with `subscribe` or `start_observing`.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.delivery.listeners.lock().unsubscribe(id)
    }

    /// Removes a listener added with `subscribe_collection`.
    pub fn unsubscribe_collection(&self, id: SubscriptionId) -> bool {
        self.core
            .delivery
            .collection_listeners
            .lock()
            .unsubscribe(id)
    }

    /// Adds a listener called on the delivery queue when a batch starts.
    pub fn on_will_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.core
            .delivery
            .will_change
            .lock()
            .subscribe(move |_: &()| listener())
    }

    /// The latest published items. Never blocks on the query's context.
    pub fn items(&self) -> StreamCollection<T> {
        self.core.delivery.items()
    }

    pub fn state(&self) -> ObserverState {
        self.core.state()
    }

    pub fn is_observing(&self) -> bool {
        self.state() == ObserverState::Observing
    }

    /// The observed query.
    pub fn query(&self) -> &Arc<L> {
        &self.core.query
    }

    /// Waits until everything the query's context has produced so far has
    /// been delivered to listeners.
    pub fn flush(&self) {
        self.core.context.perform_and_wait(&mut || {});
        if let Err(e) = self.core.delivery.queue.flush() {
            warn!(error = %e, "delivery queue unavailable");
        }
    }
}

impl<L: LiveQuery, T> Drop for BackgroundListObserver<L, T> {
    fn drop(&mut self) {
        self.core.detach();
    }
}
