//! The materialization pass shared by all observers.
//!
//! For each batch: memoize the current records into entries, apply runtime
//! sorting, then work out the change batch to deliver. The aggregator's
//! changes are delivered as they are when replaying them over the previous
//! entries reproduces the new ones exactly. Otherwise (conversion failures,
//! runtime re-ordering, synthesized events) the previous and new entries are
//! diffed instead, so delivered indices always describe the delivered
//! collection.

use crate::aggregator::{AggregatedBatch, ConvertFn};
use crate::change::ListChange;
use crate::collection::StreamCollection;
use crate::memoize::{Entry, ItemReuseMemoizer, ReuseKey};
use crate::runtime_sort::RuntimeSortMerger;
use crate::sort::SortValue;
use ripple_core::{RawRecord, RecordId};
use ripple_incremental::{diff_ordered, Edit};
use std::sync::Arc;
use tracing::trace;

pub(crate) struct MaterializedList<R, T> {
    convert: ConvertFn<R, T>,
    memo: ItemReuseMemoizer<R, T>,
    sorting: Vec<SortValue<T>>,
    entries: Vec<Entry<T>>,
    collection: StreamCollection<T>,
}

impl<R: RawRecord, T: Send + Sync + 'static> MaterializedList<R, T> {
    pub(crate) fn new(convert: ConvertFn<R, T>, sorting: Vec<SortValue<T>>) -> Self {
        Self {
            convert,
            memo: ItemReuseMemoizer::new(),
            sorting,
            entries: Vec::new(),
            collection: StreamCollection::empty(),
        }
    }

    pub(crate) fn set_reuse_key(&mut self, key: ReuseKey<R, T>) {
        self.memo.set_reuse_key(key);
    }

    pub(crate) fn collection(&self) -> StreamCollection<T> {
        self.collection.clone()
    }

    /// Rebuilds from `records` and returns the changes from the previous
    /// collection.
    pub(crate) fn refresh(&mut self, records: &[R], batch: Option<AggregatedBatch<T>>) -> Vec<ListChange<Arc<T>>> {
        let convert = self.convert.clone();
        let next = self
            .memo
            .materialize(records, batch.as_ref(), |record| convert(record));
        let next = RuntimeSortMerger::merge(next, &self.sorting);

        let changes = match batch.and_then(|b| reconcile(&self.entries, &next, b)) {
            Some(changes) => changes,
            None => diff_entries(&self.entries, &next),
        };
        trace!(records = records.len(), items = next.len(), changes = changes.len(), "materialized");

        self.collection = StreamCollection::from_items(next.iter().map(|e| e.item.clone()).collect());
        self.entries = next;
        changes
    }
}

/// Replays `batch` over `prev`. Returns its changes if the result is exactly
/// `next`; removals carry the previously delivered item.
fn reconcile<T>(prev: &[Entry<T>], next: &[Entry<T>], batch: AggregatedBatch<T>) -> Option<Vec<ListChange<Arc<T>>>> {
    let mut list: Vec<(RecordId, Arc<T>)> = prev.iter().map(|e| (e.id, e.item.clone())).collect();
    let mut out = Vec::with_capacity(batch.changes.len());

    for (id, change) in batch.ids.into_iter().zip(batch.changes) {
        match change {
            ListChange::Remove { index, .. } => {
                if list.get(index)?.0 != id {
                    return None;
                }
                let (_, item) = list.remove(index);
                out.push(ListChange::Remove { item, index });
            }
            ListChange::Insert { item, index } => {
                if index > list.len() {
                    return None;
                }
                list.insert(index, (id, item.clone()));
                out.push(ListChange::Insert { item, index });
            }
            ListChange::Move { item, from, to } => {
                if list.get(from)?.0 != id {
                    return None;
                }
                list.remove(from);
                if to > list.len() {
                    return None;
                }
                list.insert(to, (id, item.clone()));
                out.push(ListChange::Move { item, from, to });
            }
            ListChange::Update { item, index } => {
                let slot = list.get_mut(index)?;
                if slot.0 != id {
                    return None;
                }
                *slot = (id, item.clone());
                out.push(ListChange::Update { item, index });
            }
        }
    }

    let exact = list.len() == next.len()
        && list
            .iter()
            .zip(next)
            .all(|((id, item), entry)| *id == entry.id && Arc::ptr_eq(item, &entry.item));
    exact.then_some(out)
}

/// Diffs two entry lists by record id; a different `Arc` counts as a change.
pub(crate) fn diff_entries<T>(prev: &[Entry<T>], next: &[Entry<T>]) -> Vec<ListChange<Arc<T>>> {
    diff_ordered(prev, next, |e| e.id, |a, b| !Arc::ptr_eq(&a.item, &b.item))
        .into_iter()
        .map(|edit| match edit {
            Edit::Remove { old, index } => ListChange::Remove {
                item: prev[old].item.clone(),
                index,
            },
            Edit::Insert { new, index } => ListChange::Insert {
                item: next[new].item.clone(),
                index,
            },
            Edit::Move { new, from, to, .. } => ListChange::Move {
                item: next[new].item.clone(),
                from,
                to,
            },
            Edit::Update { new, index, .. } => ListChange::Update {
                item: next[new].item.clone(),
                index,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::apply_changes;
    use crate::sort::SortField;
    use ripple_core::{ConversionError, Row, Value};

    fn name(row: &Row) -> std::result::Result<String, ConversionError> {
        row.get("name")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ConversionError::missing_field(row.id(), "name"))
    }

    fn list(sorting: Vec<SortValue<String>>) -> MaterializedList<Row, String> {
        MaterializedList::new(Arc::new(name), sorting)
    }

    fn row(id: u64, n: &str) -> Row {
        Row::new(id).with("name", n)
    }

    fn entry(id: u64, item: &Arc<String>) -> Entry<String> {
        Entry::new(id, 1, item.clone())
    }

    fn strings(items: &[Arc<String>]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_initial_refresh_is_inserts() {
        let mut view = list(Vec::new());
        let changes = view.refresh(&[row(1, "a"), row(2, "b")], None);
        assert!(changes.iter().all(ListChange::is_insert));
        assert_eq!(strings(&view.collection().to_vec()), vec!["a", "b"]);
    }

    #[test]
    fn test_reconcile_keeps_engine_changes() {
        let (a, b, c) = (Arc::new("a".to_string()), Arc::new("b".to_string()), Arc::new("c".to_string()));
        let prev = vec![entry(1, &a), entry(2, &b)];
        let next = vec![entry(2, &b), entry(3, &c)];

        let mut batch = AggregatedBatch::default();
        batch.ids = vec![1, 3];
        batch.changes = vec![
            ListChange::Remove { item: Arc::new("stale".to_string()), index: 0 },
            ListChange::Insert { item: c.clone(), index: 1 },
        ];
        let changes = reconcile(&prev, &next, batch).unwrap();
        assert!(Arc::ptr_eq(changes[0].item(), &a));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_reconcile_rejects_inconsistent_batch() {
        let (a, b) = (Arc::new("a".to_string()), Arc::new("b".to_string()));
        let prev = vec![entry(1, &a), entry(2, &b)];
        let next = vec![entry(2, &b)];

        let mut batch = AggregatedBatch::default();
        batch.ids = vec![1];
        batch.changes = vec![ListChange::Remove { item: a.clone(), index: 1 }];
        assert!(reconcile(&prev, &next, batch).is_none());
    }

    #[test]
    fn test_runtime_sort_changes_are_rediffed() {
        let by_len = SortField::runtime("len", |s: &String| Some(Value::from(s.len() as i64)));
        let mut view = list(vec![SortValue::desc(by_len)]);
        view.refresh(&[row(1, "a"), row(2, "bb")], None);
        let before = view.collection().to_vec();
        assert_eq!(strings(&before), vec!["bb", "a"]);

        let changes = view.refresh(&[row(1, "ccc"), row(2, "bb")].map(|mut r| {
            r.increment_version();
            r
        }), None);
        let after = view.collection().to_vec();
        assert_eq!(strings(&after), vec!["ccc", "bb"]);
        let replayed = apply_changes(&before, &changes).unwrap();
        assert_eq!(strings(&replayed), strings(&after));
    }
}
