//! Observer machinery shared by the list observers.
//!
//! `ObserverCore` owns the live query registration, the aggregator and the
//! materialized list. All of its work runs on the live query's execution
//! context. What happens to a finished batch is left to a `Delivery`: the
//! foreground observer calls listeners inline, the background observer
//! publishes the collection and hands the batch to its own queue.

use crate::aggregator::{AggregatedBatch, ChangeAggregator, ConvertFn};
use crate::change::ListChange;
use crate::collection::StreamCollection;
use crate::memoize::ReuseKey;
use crate::sort::{matches_native_order, SortValue};
use crate::teardown::{BulkRemovalBridge, BulkRemovalTarget};
use crate::view::MaterializedList;
use parking_lot::Mutex;
use ripple_core::{ChangeKind, Error, ExecutionContext, LiveQuery, Result, ResultsDelegate};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle of an observer. There is no stopped state; dropping the
/// observer ends observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObserverState {
    /// The query is registered but not fetched.
    Idle,
    /// The query is fetched and live updates are flowing.
    Observing,
}

/// Where finished batches go. Every method runs on the query's context.
pub(crate) trait Delivery<T>: Send + Sync + 'static {
    /// A batch is starting.
    fn will_change(&self);

    /// The initial collection after a successful start.
    fn initial(&self, changes: Vec<ListChange<Arc<T>>>, collection: StreamCollection<T>);

    /// A non-empty batch and the collection it produced.
    fn deliver(&self, changes: Vec<ListChange<Arc<T>>>, collection: StreamCollection<T>);
}

struct CoreState<R, T> {
    view: MaterializedList<R, T>,
    phase: ObserverState,
    /// Set between the two bulk removal signals.
    suspended: bool,
}

pub(crate) struct ObserverCore<L: LiveQuery, T, D> {
    pub(crate) query: Arc<L>,
    pub(crate) context: Arc<dyn ExecutionContext>,
    aggregator: Arc<ChangeAggregator<L::Record, T>>,
    state: Mutex<CoreState<L::Record, T>>,
    bridge: Mutex<Option<BulkRemovalBridge>>,
    pub(crate) delivery: D,
}

impl<L, T, D> ObserverCore<L, T, D>
where
    L: LiveQuery,
    T: Send + Sync + 'static,
    D: Delivery<T>,
{
    pub(crate) fn new(query: Arc<L>, convert: ConvertFn<L::Record, T>, sorting: Vec<SortValue<T>>, delivery: D) -> Arc<Self> {
        if !matches_native_order(&sorting, &query.sort_descriptors()) {
            warn!(query = %query.describe(), "native sort criteria do not lead the query's sort descriptors");
        }
        let core = Arc::new(Self {
            context: query.context(),
            aggregator: Arc::new(ChangeAggregator::new(convert.clone())),
            state: Mutex::new(CoreState {
                view: MaterializedList::new(convert, sorting),
                phase: ObserverState::Idle,
                suspended: false,
            }),
            bridge: Mutex::new(None),
            query,
            delivery,
        });

        let weak = Arc::downgrade(&core);
        core.aggregator.on_will_change(move || {
            if let Some(core) = weak.upgrade() {
                core.delivery.will_change();
            }
        });
        let weak = Arc::downgrade(&core);
        core.aggregator.on_did_change(move |batch| {
            if let Some(core) = weak.upgrade() {
                core.apply(batch);
            }
        });
        core
    }

    pub(crate) fn set_reuse_key(&self, key: ReuseKey<L::Record, T>) {
        self.state.lock().view.set_reuse_key(key);
    }

    pub(crate) fn state(&self) -> ObserverState {
        self.state.lock().phase
    }

    /// The current collection. Must be called on the context.
    pub(crate) fn collection(&self) -> StreamCollection<T> {
        self.state.lock().view.collection()
    }

    /// Fetches, materializes and starts listening. Does nothing if already
    /// observing.
    pub(crate) fn start(self: &Arc<Self>) -> Result<()> {
        let mut result = Ok(());
        self.context
            .perform_and_wait(&mut || result = self.start_on_context());
        result
    }

    fn start_on_context(self: &Arc<Self>) -> Result<()> {
        if self.state() == ObserverState::Observing {
            return Ok(());
        }

        self.query.perform_fetch().map_err(|e| {
            error!(query = %self.query.describe(), error = %e, "initial fetch failed");
            if e.is_fetch_failure() {
                e
            } else {
                Error::fetch(self.query.describe(), e.to_string())
            }
        })?;

        let records = self.query.fetched();
        let (changes, collection) = {
            let mut state = self.state.lock();
            let changes = state.view.refresh(&records, None);
            state.phase = ObserverState::Observing;
            (changes, state.view.collection())
        };

        self.attach_delegate();
        let target: Arc<dyn BulkRemovalTarget> = self.clone();
        *self.bridge.lock() = Some(BulkRemovalBridge::attach(&self.context, Arc::downgrade(&target)));

        info!(query = %self.query.describe(), items = collection.len(), "observing");
        self.delivery.initial(changes, collection);
        Ok(())
    }

    fn attach_delegate(&self) {
        let delegate: Arc<dyn ResultsDelegate<L::Record>> = self.aggregator.clone();
        self.query.set_delegate(Some(Arc::downgrade(&delegate)));
    }

    /// Handles one aggregated batch. Runs on the context.
    fn apply(&self, batch: AggregatedBatch<T>) {
        let (changes, collection) = {
            let mut state = self.state.lock();
            if state.phase != ObserverState::Observing {
                return;
            }
            let records = if state.suspended {
                Vec::new()
            } else {
                self.query.fetched()
            };
            let changes = state.view.refresh(&records, Some(batch));
            (changes, state.view.collection())
        };

        if changes.is_empty() {
            return;
        }
        debug!(query = %self.query.describe(), changes = changes.len(), items = collection.len(), "delivering batch");
        self.delivery.deliver(changes, collection);
    }
}

impl<L: LiveQuery, T, D> ObserverCore<L, T, D> {
    /// Stops receiving live query events and teardown signals.
    pub(crate) fn detach(&self) {
        self.query.set_delegate(None);
        self.bridge.lock().take();
    }
}

impl<L, T, D> BulkRemovalTarget for ObserverCore<L, T, D>
where
    L: LiveQuery,
    T: Send + Sync + 'static,
    D: Delivery<T>,
{
    fn will_remove_all_data(&self) {
        if self.state() != ObserverState::Observing {
            return;
        }
        let records = self.query.fetched();
        self.state.lock().suspended = true;
        debug!(query = %self.query.describe(), records = records.len(), "removing all items");

        self.aggregator.will_change();
        for (index, record) in records.iter().enumerate().rev() {
            self.aggregator
                .did_change_record(record, Some(index), ChangeKind::Delete, None);
        }
        self.aggregator.did_change_content();

        // Anything the synthesized batch did not cover.
        let (changes, collection) = {
            let mut state = self.state.lock();
            (state.view.refresh(&[], None), state.view.collection())
        };
        if !changes.is_empty() {
            self.delivery.deliver(changes, collection);
        }

        self.query.set_delegate(None);
    }

    fn did_remove_all_data(&self) {
        if self.state() != ObserverState::Observing {
            return;
        }
        self.state.lock().suspended = false;

        if let Err(e) = self.query.perform_fetch() {
            error!(query = %self.query.describe(), error = %e, "cannot restart after removing all data");
            return;
        }
        let records = self.query.fetched();
        let (changes, collection) = {
            let mut state = self.state.lock();
            (state.view.refresh(&records, None), state.view.collection())
        };
        self.attach_delegate();
        debug!(query = %self.query.describe(), items = collection.len(), "restarted after removing all data");

        if !changes.is_empty() {
            self.delivery.deliver(changes, collection);
        }
    }
}
