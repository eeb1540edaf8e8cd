//! Live queries over a store.
//!
//! A `StoreLiveQuery` keeps the fetched rows of one query and, after each
//! commit that touches its table, recomputes them and reports the difference
//! to its delegate as sequential per-record events on its context.

use crate::context::Context;
use crate::journal::TableDiff;
use crate::query::QuerySpec;
use crate::store::StoreInner;
use parking_lot::Mutex;
use ripple_core::{
    ChangeKind, Error, ExecutionContext, LiveQuery, RawRecord, RecordId, Result, ResultsDelegate, Row,
    SortDescriptor,
};
use ripple_incremental::{diff_ordered, Edit};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

type RowDelegate = Weak<dyn ResultsDelegate<Arc<Row>>>;

#[derive(Default)]
struct LiveState {
    rows: Vec<Arc<Row>>,
    /// Commit sequence number the rows reflect; `None` until fetched.
    fetched_at: Option<u64>,
    delegate: Option<RowDelegate>,
}

/// A registered query with change tracking.
pub struct StoreLiveQuery {
    spec: QuerySpec,
    store: Weak<StoreInner>,
    context: Arc<Context>,
    state: Mutex<LiveState>,
}

impl StoreLiveQuery {
    pub(crate) fn new(spec: QuerySpec, store: Weak<StoreInner>, context: Arc<Context>) -> Self {
        Self {
            spec,
            store,
            context,
            state: Mutex::new(LiveState::default()),
        }
    }

    /// Returns the query.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Returns true once the query has been fetched.
    pub fn is_fetched(&self) -> bool {
        self.state.lock().fetched_at.is_some()
    }

    /// Returns true if a live delegate is attached.
    pub fn has_delegate(&self) -> bool {
        self.state
            .lock()
            .delegate
            .as_ref()
            .map_or(false, |d| d.strong_count() > 0)
    }

    /// Applies the diff of commit `seq`. Runs on the query's context.
    pub(crate) fn apply(&self, seq: u64, diff: &TableDiff) {
        let (edits, old, new, delegate) = {
            let mut state = self.state.lock();
            match state.fetched_at {
                Some(at) if seq > at => state.fetched_at = Some(seq),
                _ => return,
            }

            let old = state.rows.clone();
            let mut by_id: BTreeMap<RecordId, Arc<Row>> =
                old.iter().map(|row| (row.id(), row.clone())).collect();
            for id in diff.get_deleted().keys() {
                by_id.remove(id);
            }
            for row in diff.upserts() {
                if self.spec.matches(row) {
                    by_id.insert(row.id(), row.clone());
                } else {
                    by_id.remove(&row.id());
                }
            }

            let mut new: Vec<Arc<Row>> = by_id.into_values().collect();
            self.spec.sort_rows(&mut new);
            let edits = diff_ordered(&old, &new, |row| row.id(), |a, b| a.version() != b.version());
            state.rows = new.clone();

            if edits.is_empty() {
                return;
            }
            let delegate = state.delegate.as_ref().and_then(Weak::upgrade);
            (edits, old, new, delegate)
        };

        trace!(query = %self.spec, seq, edits = edits.len(), "live query refreshed");
        let Some(delegate) = delegate else {
            return;
        };

        delegate.will_change();
        for edit in edits {
            match edit {
                Edit::Remove { old: i, index } => {
                    delegate.did_change_record(&old[i], Some(index), ChangeKind::Delete, None)
                }
                Edit::Insert { new: j, index } => {
                    delegate.did_change_record(&new[j], None, ChangeKind::Insert, Some(index))
                }
                Edit::Move { new: j, from, to, .. } => {
                    delegate.did_change_record(&new[j], Some(from), ChangeKind::Move, Some(to))
                }
                Edit::Update { new: j, index, .. } => {
                    delegate.did_change_record(&new[j], Some(index), ChangeKind::Update, None)
                }
            }
        }
        delegate.did_change_content();
    }
}

impl LiveQuery for StoreLiveQuery {
    type Record = Arc<Row>;

    fn describe(&self) -> String {
        self.spec.to_string()
    }

    fn perform_fetch(&self) -> Result<()> {
        let store = self
            .store
            .upgrade()
            .ok_or_else(|| Error::fetch(self.describe(), "store has been dropped"))?;

        let (rows, seq) = {
            let state = store.state.read();
            let rows = self
                .spec
                .evaluate(&state.cache)
                .map_err(|e| Error::fetch(self.describe(), e.to_string()))?;
            (rows, state.seq)
        };

        debug!(query = %self.spec, rows = rows.len(), "fetched");
        let mut state = self.state.lock();
        state.rows = rows;
        state.fetched_at = Some(seq);
        Ok(())
    }

    fn fetched(&self) -> Vec<Arc<Row>> {
        self.state.lock().rows.clone()
    }

    fn sort_descriptors(&self) -> Vec<SortDescriptor> {
        self.spec.sort().to_vec()
    }

    fn set_delegate(&self, delegate: Option<RowDelegate>) {
        self.state.lock().delegate = delegate;
    }

    fn context(&self) -> Arc<dyn ExecutionContext> {
        self.context.clone()
    }
}

impl std::fmt::Debug for StoreLiveQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLiveQuery")
            .field("spec", &self.spec)
            .field("context", &self.context.label())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Store, StoreConfig};
    use ripple_core::SortDescriptor;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(RecordId, Option<usize>, ChangeKind, Option<usize>)>>,
        batches: Mutex<usize>,
    }

    impl ResultsDelegate<Arc<Row>> for Recorder {
        fn will_change(&self) {}

        fn did_change_record(
            &self,
            record: &Arc<Row>,
            index: Option<usize>,
            kind: ChangeKind,
            new_index: Option<usize>,
        ) {
            self.events.lock().push((record.id(), index, kind, new_index));
        }

        fn did_change_content(&self) {
            *self.batches.lock() += 1;
        }
    }

    fn setup() -> (Store, Arc<StoreLiveQuery>, Arc<Recorder>) {
        let store = Store::new(StoreConfig::default()).unwrap();
        store.create_table("channels").unwrap();
        let query = store
            .live_query(
                &store.view_context(),
                QuerySpec::new("channels").sort_by(SortDescriptor::asc("name")),
            )
            .unwrap();
        let recorder = Arc::new(Recorder::default());
        let delegate: Arc<dyn ResultsDelegate<Arc<Row>>> = recorder.clone();
        query.set_delegate(Some(Arc::downgrade(&delegate)));
        (store, query, recorder)
    }

    #[test]
    fn test_fetch_reads_current_rows() {
        let (store, query, _) = setup();
        store
            .write(|tx| {
                tx.insert("channels", Row::new(1).with("name", "b"))?;
                tx.insert("channels", Row::new(2).with("name", "a"))
            })
            .unwrap();

        assert!(query.fetched().is_empty());
        query.perform_fetch().unwrap();
        let ids: Vec<_> = query.fetched().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_unfetched_query_reports_nothing() {
        let (store, query, recorder) = setup();
        store.write(|tx| tx.insert("channels", Row::new(1).with("name", "a"))).unwrap();
        assert!(recorder.events.lock().is_empty());
        assert!(!query.is_fetched());
    }

    #[test]
    fn test_commit_reports_sequential_events() {
        let (store, query, recorder) = setup();
        query.perform_fetch().unwrap();

        store
            .write(|tx| {
                tx.insert("channels", Row::new(1).with("name", "b"))?;
                tx.insert("channels", Row::new(2).with("name", "a"))
            })
            .unwrap();
        assert_eq!(
            *recorder.events.lock(),
            vec![
                (2, None, ChangeKind::Insert, Some(0)),
                (1, None, ChangeKind::Insert, Some(1)),
            ]
        );
        assert_eq!(*recorder.batches.lock(), 1);

        recorder.events.lock().clear();
        store.write(|tx| tx.update("channels", Row::new(1).with("name", "0"))).unwrap();
        assert_eq!(
            *recorder.events.lock(),
            vec![(1, Some(1), ChangeKind::Move, Some(0))]
        );

        recorder.events.lock().clear();
        store.write(|tx| tx.delete("channels", 2).map(|_| ())).unwrap();
        assert_eq!(
            *recorder.events.lock(),
            vec![(2, Some(1), ChangeKind::Delete, None)]
        );
        assert_eq!(*recorder.batches.lock(), 3);
    }

    #[test]
    fn test_update_in_place() {
        let (store, query, recorder) = setup();
        store.write(|tx| tx.insert("channels", Row::new(1).with("name", "a"))).unwrap();
        query.perform_fetch().unwrap();

        store
            .write(|tx| tx.modify("channels", 1, |row| {
                row.set("topic", "news");
            }))
            .unwrap();
        assert_eq!(
            *recorder.events.lock(),
            vec![(1, Some(0), ChangeKind::Update, None)]
        );
    }

    #[test]
    fn test_filter_exit_is_delete() {
        let store = Store::new(StoreConfig::default()).unwrap();
        store.create_table("channels").unwrap();
        store.write(|tx| tx.insert("channels", Row::new(1).with("name", "a").with("hidden", false))).unwrap();

        let query = store
            .live_query(
                &store.view_context(),
                QuerySpec::new("channels")
                    .filter_eq("hidden", false)
                    .sort_by(SortDescriptor::asc("name")),
            )
            .unwrap();
        query.perform_fetch().unwrap();
        assert_eq!(query.fetched().len(), 1);

        store.write(|tx| tx.modify("channels", 1, |row| {
            row.set("hidden", true);
        })).unwrap();
        assert!(query.fetched().is_empty());
    }
}
