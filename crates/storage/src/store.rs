//! The in-memory store.
//!
//! `Store` owns the tables, a view context and a background context. Writes
//! run as transactions under a commit lock; each commit's table diffs are
//! handed to the live queries reading those tables, on their contexts, in
//! commit order.

use crate::cache::TableCache;
use crate::context::Context;
use crate::journal::TableDiff;
use crate::live::StoreLiveQuery;
use crate::query::QuerySpec;
use crate::registry::QueryRegistry;
use crate::transaction::Transaction;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use ripple_core::{ExecutionContext, LiveQuery, Result, Row, StoreSignal};
use std::sync::Arc;
use tracing::{debug, info};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Label of the view context.
    pub view_label: String,
    /// Name of the background context's worker thread.
    pub background_label: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            view_label: "ripple.view".into(),
            background_label: "ripple.background".into(),
        }
    }
}

impl StoreConfig {
    /// Sets the view context label.
    pub fn with_view_label(mut self, label: impl Into<String>) -> Self {
        self.view_label = label.into();
        self
    }

    /// Sets the background context thread name.
    pub fn with_background_label(mut self, label: impl Into<String>) -> Self {
        self.background_label = label.into();
        self
    }
}

pub(crate) struct StoreState {
    pub(crate) cache: TableCache,
    /// Number of commits that changed data, plus bulk removals.
    pub(crate) seq: u64,
}

pub(crate) struct StoreInner {
    pub(crate) state: RwLock<StoreState>,
    commit_lock: ReentrantMutex<()>,
    registry: Mutex<QueryRegistry>,
    view: Arc<Context>,
    background: Arc<Context>,
}

/// Handle to an in-memory store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Creates an empty store.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let background = Context::queue(config.background_label)?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState {
                    cache: TableCache::new(),
                    seq: 0,
                }),
                commit_lock: ReentrantMutex::new(()),
                registry: Mutex::new(QueryRegistry::new()),
                view: Arc::new(Context::immediate(config.view_label)),
                background: Arc::new(background),
            }),
        })
    }

    /// Creates a table.
    pub fn create_table(&self, name: &str) -> Result<()> {
        self.inner.state.write().cache.create_table(name)
    }

    /// The inline view context.
    pub fn view_context(&self) -> Arc<Context> {
        self.inner.view.clone()
    }

    /// The background context.
    pub fn background_context(&self) -> Arc<Context> {
        self.inner.background.clone()
    }

    /// Registers a live query delivering on `context`.
    ///
    /// Fails with `InvalidQuery` if the query has no sort descriptor. The
    /// query is not fetched yet.
    pub fn live_query(&self, context: &Arc<Context>, spec: QuerySpec) -> Result<Arc<StoreLiveQuery>> {
        spec.validate()?;
        let query = Arc::new(StoreLiveQuery::new(
            spec,
            Arc::downgrade(&self.inner),
            context.clone(),
        ));
        self.inner.registry.lock().register(&query);
        Ok(query)
    }

    /// Evaluates a query once against the current data.
    pub fn fetch(&self, spec: &QuerySpec) -> Result<Vec<Arc<Row>>> {
        spec.evaluate(&self.inner.state.read().cache)
    }

    /// Reads the tables.
    pub fn read<T>(&self, f: impl FnOnce(&TableCache) -> T) -> T {
        f(&self.inner.state.read().cache)
    }

    /// Runs `f` in a write transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and rolls back otherwise.
    /// Live queries on the view context are updated before this returns; those
    /// on the background context are updated asynchronously.
    pub fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let _commit = self.inner.commit_lock.lock();

        let (value, diffs, seq) = {
            let mut state = self.inner.state.write();
            let StoreState { cache, seq } = &mut *state;
            let mut tx = Transaction::begin(cache);
            match f(&mut tx) {
                Ok(value) => {
                    let diffs = tx.commit()?;
                    if !diffs.is_empty() {
                        *seq += 1;
                    }
                    (value, diffs, *seq)
                }
                Err(e) => {
                    tx.rollback()?;
                    return Err(e);
                }
            }
        };

        if !diffs.is_empty() {
            self.dispatch(seq, diffs);
        }
        Ok(value)
    }

    fn dispatch(&self, seq: u64, diffs: Vec<TableDiff>) {
        let routed: Vec<(Arc<StoreLiveQuery>, Arc<TableDiff>)> = {
            let mut registry = self.inner.registry.lock();
            registry.cleanup();
            diffs
                .into_iter()
                .map(Arc::new)
                .flat_map(|diff| {
                    registry
                        .queries_for(diff.table_name())
                        .into_iter()
                        .map(move |query| (query, diff.clone()))
                })
                .collect()
        };

        debug!(seq, queries = routed.len(), "dispatching commit");
        for (query, diff) in routed {
            let context = query.context();
            context.perform(Box::new(move || query.apply(seq, &diff)));
        }
    }

    /// Erases every row of every table.
    ///
    /// `WillRemoveAllData` is published on both contexts while rows are still
    /// present, `DidRemoveAllData` after they are gone. Live queries receive
    /// no per-record events for the erased rows.
    pub fn remove_all_data(&self) {
        let _commit = self.inner.commit_lock.lock();
        let contexts = [&self.inner.view, &self.inner.background];

        for context in contexts {
            context.signals().publish(StoreSignal::WillRemoveAllData);
        }
        {
            let mut state = self.inner.state.write();
            state.cache.clear();
            state.seq += 1;
        }
        info!("all data removed");
        for context in contexts {
            context.signals().publish(StoreSignal::DidRemoveAllData);
        }
    }

    /// Number of registered live queries that are still alive.
    pub fn live_query_count(&self) -> usize {
        self.inner.registry.lock().query_count()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Store")
            .field("tables", &state.cache.table_names())
            .field("seq", &state.seq)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::{Error, RawRecord, SortDescriptor};

    fn store() -> Store {
        let store = Store::new(StoreConfig::default()).unwrap();
        store.create_table("channels").unwrap();
        store
    }

    fn by_name() -> QuerySpec {
        QuerySpec::new("channels").sort_by(SortDescriptor::asc("name"))
    }

    #[test]
    fn test_write_commits() {
        let store = store();
        let id = store.write(|tx| tx.insert("channels", Row::new(1).with("name", "a"))).unwrap();
        assert_eq!(id, 1);
        assert_eq!(store.read(|cache| cache.total_row_count()), 1);
    }

    #[test]
    fn test_write_error_rolls_back() {
        let store = store();
        let result: Result<()> = store.write(|tx| {
            tx.insert("channels", Row::new(1))?;
            tx.insert("missing", Row::new(2))?;
            Ok(())
        });
        assert!(matches!(result, Err(Error::TableNotFound { .. })));
        assert_eq!(store.read(|cache| cache.total_row_count()), 0);
    }

    #[test]
    fn test_live_query_requires_sort() {
        let store = store();
        let err = store
            .live_query(&store.view_context(), QuerySpec::new("channels"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuery { .. }));
    }

    #[test]
    fn test_fetch_unknown_table_is_fetch_failure() {
        let store = store();
        let query = store
            .live_query(
                &store.view_context(),
                QuerySpec::new("nope").sort_by(SortDescriptor::asc("name")),
            )
            .unwrap();
        let err = query.perform_fetch().unwrap_err();
        assert!(err.is_fetch_failure());
        assert!(matches!(err, Error::Fetch { .. }));
    }

    #[test]
    fn test_background_query_updates_asynchronously() {
        let store = store();
        let query = store.live_query(&store.background_context(), by_name()).unwrap();
        query.perform_fetch().unwrap();

        store.write(|tx| tx.insert("channels", Row::new(1).with("name", "a"))).unwrap();
        store.background_context().flush();
        assert_eq!(query.fetched().len(), 1);
    }

    #[test]
    fn test_remove_all_data_publishes_signals() {
        let store = store();
        store.write(|tx| tx.insert("channels", Row::new(1))).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s, reader) = (seen.clone(), store.clone());
        store.view_context().signals().subscribe(move |signal| {
            let rows = reader.read(|cache| cache.total_row_count());
            s.lock().push((signal, rows));
        });

        store.remove_all_data();
        assert_eq!(
            *seen.lock(),
            vec![
                (StoreSignal::WillRemoveAllData, 1),
                (StoreSignal::DidRemoveAllData, 0),
            ]
        );
    }

    #[test]
    fn test_remove_all_data_sends_no_record_events() {
        let store = store();
        store.write(|tx| tx.insert("channels", Row::new(1).with("name", "a"))).unwrap();
        let query = store.live_query(&store.view_context(), by_name()).unwrap();
        query.perform_fetch().unwrap();

        store.remove_all_data();
        assert_eq!(query.fetched().len(), 1);
        query.perform_fetch().unwrap();
        assert!(query.fetched().is_empty());
    }

    #[test]
    fn test_stale_commit_skipped_after_fetch() {
        let store = store();
        let query = store.live_query(&store.background_context(), by_name()).unwrap();
        query.perform_fetch().unwrap();

        let ctx = store.background_context();
        let gate = Arc::new(parking_lot::Mutex::new(()));
        let held = gate.lock();
        let g = gate.clone();
        ctx.perform(Box::new(move || drop(g.lock())));

        store.write(|tx| tx.insert("channels", Row::new(1).with("name", "a"))).unwrap();
        store.write(|tx| tx.insert("channels", Row::new(2).with("name", "b"))).unwrap();
        // Refetch while both commits are still queued.
        query.perform_fetch().unwrap();
        assert_eq!(query.fetched().len(), 2);

        drop(held);
        ctx.flush();
        let ids: Vec<_> = query.fetched().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_dropped_queries_are_unregistered() {
        let store = store();
        let query = store.live_query(&store.view_context(), by_name()).unwrap();
        assert_eq!(store.live_query_count(), 1);
        drop(query);
        assert_eq!(store.live_query_count(), 0);
    }
}
