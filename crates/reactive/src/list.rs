//! Foreground list observation.
//!
//! A `ListObserver` delivers on the live query's own context: when the query
//! runs on the store's view context, listeners are called inline by the
//! committing thread before the write returns.

use crate::aggregator::ConvertFn;
use crate::change::ListChange;
use crate::collection::StreamCollection;
use crate::memoize::ReuseKey;
use crate::observer::{Delivery, ObserverCore, ObserverState};
use crate::sort::SortValue;
use crate::subscription::{SubscriptionId, SubscriptionManager};
use parking_lot::Mutex;
use ripple_core::{ConversionError, LiveQuery, Result};
use std::sync::Arc;

pub(crate) struct InlineDelivery<T> {
    listeners: Mutex<SubscriptionManager<[ListChange<Arc<T>>]>>,
    will_change: Mutex<SubscriptionManager<()>>,
}

impl<T> InlineDelivery<T> {
    fn new() -> Self {
        Self {
            listeners: Mutex::new(SubscriptionManager::new()),
            will_change: Mutex::new(SubscriptionManager::new()),
        }
    }
}

impl<T: Send + Sync + 'static> Delivery<T> for InlineDelivery<T> {
    fn will_change(&self) {
        let callbacks = self.will_change.lock().snapshot();
        for callback in callbacks {
            callback(&());
        }
    }

    fn initial(&self, _changes: Vec<ListChange<Arc<T>>>, _collection: StreamCollection<T>) {}

    fn deliver(&self, changes: Vec<ListChange<Arc<T>>>, _collection: StreamCollection<T>) {
        let callbacks = self.listeners.lock().snapshot();
        for callback in callbacks {
            callback(&changes);
        }
    }
}

/// Observes an ordered query and reports `ListChange` batches.
///
/// # Example
///
/// ```rust
/// use ripple_core::{ConversionError, Row, Value};
/// use ripple_reactive::{native_descriptors, ListObserver, SortField, SortValue};
/// use ripple_storage::{QuerySpec, Store, StoreConfig};
/// use std::sync::Arc;
///
/// let store = Store::new(StoreConfig::default()).unwrap();
/// store.create_table("channels").unwrap();
///
/// let sorting = vec![SortValue::asc(SortField::native("name", |name: &String| {
///     Some(Value::from(name.as_str()))
/// }))];
/// let query = store
///     .live_query(
///         &store.view_context(),
///         QuerySpec::new("channels").sort_by_all(native_descriptors(&sorting)),
///     )
///     .unwrap();
///
/// let observer = ListObserver::new(
///     query,
///     |row: &Arc<Row>| {
///         row.get("name")
///             .and_then(Value::as_str)
///             .map(str::to_owned)
///             .ok_or_else(|| ConversionError::missing_field(row.id(), "name"))
///     },
///     sorting,
/// );
/// observer.start_observing(|changes| println!("{} changes", changes.len())).unwrap();
///
/// store.write(|tx| tx.insert("channels", Row::new(1).with("name", "general"))).unwrap();
/// assert_eq!(observer.items().len(), 1);
/// ```
pub struct ListObserver<L: LiveQuery, T> {
    core: Arc<ObserverCore<L, T, InlineDelivery<T>>>,
}

impl<L, T> ListObserver<L, T>
where
    L: LiveQuery,
    T: Send + Sync + 'static,
{
    /// Creates an idle observer. The native criteria of `sorting` must lead
    /// the query's own sort descriptors, otherwise a warning is logged;
    /// runtime-only criteria are applied in memory.
    pub fn new<F>(query: Arc<L>, convert: F, sorting: Vec<SortValue<T>>) -> Self
    where
        F: Fn(&L::Record) -> std::result::Result<T, ConversionError> + Send + Sync + 'static,
    {
        let convert: ConvertFn<L::Record, T> = Arc::new(convert);
        Self {
            core: ObserverCore::new(query, convert, sorting, InlineDelivery::new()),
        }
    }

    /// Reuses prior items whose keys match the record's.
    pub fn with_reuse_key(self, key: ReuseKey<L::Record, T>) -> Self {
        self.core.set_reuse_key(key);
        self
    }

    /// Starts observing and subscribes `on_change`.
    ///
    /// Fails with a fetch error if the initial fetch fails; the observer then
    /// stays idle and `on_change` is not subscribed.
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

    /// Starts observing without a listener.
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

    /// Removes a listener added with `subscribe` or `start_observing`.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.delivery.listeners.lock().unsubscribe(id)
    }

    /// Adds a listener called when a batch starts.
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

    /// The current items, read on the query's context.
    pub fn items(&self) -> StreamCollection<T> {
        let mut items = StreamCollection::empty();
        self.core
            .context
            .perform_and_wait(&mut || items = self.core.collection());
        items
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
}

impl<L: LiveQuery, T> Drop for ListObserver<L, T> {
    fn drop(&mut self) {
        self.core.detach();
    }
}
