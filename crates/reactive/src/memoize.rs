//! Item reuse across materializations.
//!
//! `ItemReuseMemoizer` remembers the item it produced for each record so a
//! later materialization can hand out the very same `Arc` when the record has
//! not meaningfully changed. Downstream consumers can then use
//! `Arc::ptr_eq` to tell whether a row changed.

use crate::aggregator::AggregatedBatch;
use hashbrown::HashMap;
use ripple_core::{ConversionError, RawRecord, RecordId, Value};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// One materialized record.
pub struct Entry<T> {
    pub id: RecordId,
    /// Record version the item was built from.
    pub version: u64,
    pub item: Arc<T>,
}

impl<T> Entry<T> {
    /// Creates an entry.
    pub fn new(id: RecordId, version: u64, item: Arc<T>) -> Self {
        Self { id, version, item }
    }
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            version: self.version,
            item: self.item.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Entry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("item", &self.item)
            .finish()
    }
}

/// A pair of key paths identifying "same content" between an item and a
/// record, e.g. an id together with an `updated_at` stamp.
pub struct ReuseKey<R, T> {
    item_key: Arc<dyn Fn(&T) -> Value + Send + Sync>,
    record_key: Arc<dyn Fn(&R) -> Value + Send + Sync>,
}

impl<R, T> ReuseKey<R, T> {
    /// Creates a reuse key from the item-side and record-side projections.
    pub fn new<FI, FR>(item_key: FI, record_key: FR) -> Self
    where
        FI: Fn(&T) -> Value + Send + Sync + 'static,
        FR: Fn(&R) -> Value + Send + Sync + 'static,
    {
        Self {
            item_key: Arc::new(item_key),
            record_key: Arc::new(record_key),
        }
    }

    /// Returns true if `item` was built from content equal to `record`'s.
    pub fn matches(&self, item: &T, record: &R) -> bool {
        (self.item_key)(item) == (self.record_key)(record)
    }
}

impl<R, T> Clone for ReuseKey<R, T> {
    fn clone(&self) -> Self {
        Self {
            item_key: self.item_key.clone(),
            record_key: self.record_key.clone(),
        }
    }
}

/// Produces items for records, reusing prior items where possible.
pub struct ItemReuseMemoizer<R, T> {
    prior: HashMap<RecordId, Entry<T>>,
    reuse_key: Option<ReuseKey<R, T>>,
}

impl<R, T> Default for ItemReuseMemoizer<R, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, T> ItemReuseMemoizer<R, T> {
    /// Creates an empty memoizer.
    pub fn new() -> Self {
        Self {
            prior: HashMap::new(),
            reuse_key: None,
        }
    }

    /// Sets the reuse key pair.
    pub fn set_reuse_key(&mut self, key: ReuseKey<R, T>) {
        self.reuse_key = Some(key);
    }

    /// Number of remembered items.
    pub fn len(&self) -> usize {
        self.prior.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prior.is_empty()
    }

    /// Forgets every remembered item.
    pub fn clear(&mut self) {
        self.prior.clear();
    }
}

impl<R: RawRecord, T> ItemReuseMemoizer<R, T> {
    /// Materializes `records` in order and remembers the result.
    ///
    /// For each record the first applicable rule wins:
    ///
    /// 1. nothing, if `batch` failed to convert it;
    /// 2. the prior item, if the reuse key pair matches;
    /// 3. the item `batch` converted for it;
    /// 4. the prior item, if `batch` did not touch the record;
    /// 5. the prior item, if the record version is unchanged;
    /// 6. a fresh conversion.
    ///
    /// Records that fail to convert are logged and left out, so the result may
    /// be shorter than `records`.
    pub fn materialize<F>(&mut self, records: &[R], batch: Option<&AggregatedBatch<T>>, convert: F) -> Vec<Entry<T>>
    where
        F: Fn(&R) -> std::result::Result<T, ConversionError>,
    {
        let mut next = HashMap::with_capacity(records.len());
        let mut entries = Vec::with_capacity(records.len());

        for record in records {
            let id = record.id();
            let version = record.version();
            let Some(item) = self.item_for(record, batch, &convert) else {
                continue;
            };
            let entry = Entry::new(id, version, item);
            next.insert(id, entry.clone());
            entries.push(entry);
        }

        self.prior = next;
        entries
    }

    fn item_for<F>(&self, record: &R, batch: Option<&AggregatedBatch<T>>, convert: &F) -> Option<Arc<T>>
    where
        F: Fn(&R) -> std::result::Result<T, ConversionError>,
    {
        let id = record.id();
        if batch.map_or(false, |b| b.failed.contains(&id)) {
            return None;
        }
        let prior = self.prior.get(&id);
        if let (Some(prior), Some(key)) = (prior, self.reuse_key.as_ref()) {
            if key.matches(&prior.item, record) {
                return Some(prior.item.clone());
            }
        }
        if let Some(item) = batch.and_then(|b| b.converted.get(&id)) {
            return Some(item.clone());
        }
        if let Some(prior) = prior {
            let untouched = batch.map_or(false, |b| !b.touched.contains(&id));
            if untouched || prior.version == record.version() {
                return Some(prior.item.clone());
            }
        }

        match convert(record) {
            Ok(item) => Some(Arc::new(item)),
            Err(e) => {
                warn!(record = id, error = %e, "skipping record: conversion failed");
                None
            }
        }
    }
}

impl<R, T> fmt::Debug for ItemReuseMemoizer<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemReuseMemoizer")
            .field("len", &self.prior.len())
            .field("reuse_key", &self.reuse_key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::Row;
    use std::cell::Cell;

    #[derive(Debug, PartialEq)]
    struct Channel {
        id: u64,
        name: String,
        updated_at: i64,
    }

    fn convert(row: &Row) -> std::result::Result<Channel, ConversionError> {
        Ok(Channel {
            id: row.id(),
            name: row
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ConversionError::missing_field(row.id(), "name"))?
                .to_owned(),
            updated_at: row.get("updated_at").and_then(Value::as_i64).unwrap_or(0),
        })
    }

    fn row(id: u64, name: &str, version: u64) -> Row {
        let mut row = Row::new(id).with("name", name);
        row.set_version(version);
        row
    }

    #[test]
    fn test_same_version_reuses_item() {
        let mut memo = ItemReuseMemoizer::new();
        let first = memo.materialize(&[row(1, "a", 1), row(2, "b", 1)], None, convert);
        let second = memo.materialize(&[row(2, "b", 1), row(1, "a", 2)], None, convert);

        assert!(Arc::ptr_eq(&first[1].item, &second[0].item));
        assert!(!Arc::ptr_eq(&first[0].item, &second[1].item));
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_untouched_records_reuse_even_if_version_differs() {
        let mut memo = ItemReuseMemoizer::new();
        let first = memo.materialize(&[row(1, "a", 1)], None, convert);

        let batch = AggregatedBatch::<Channel>::default();
        let second = memo.materialize(&[row(1, "a", 7)], Some(&batch), convert);
        assert!(Arc::ptr_eq(&first[0].item, &second[0].item));
    }

    #[test]
    fn test_batch_converted_item_is_taken() {
        let mut memo = ItemReuseMemoizer::new();
        memo.materialize(&[row(1, "a", 1)], None, convert);

        let mut batch = AggregatedBatch::default();
        let fresh = Arc::new(Channel { id: 1, name: "fresh".into(), updated_at: 0 });
        batch.converted.insert(1, fresh.clone());
        batch.touched.insert(1);

        let calls = Cell::new(0);
        let entries = memo.materialize(&[row(1, "a", 2)], Some(&batch), |r: &Row| {
            calls.set(calls.get() + 1);
            convert(r)
        });
        assert!(Arc::ptr_eq(&entries[0].item, &fresh));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_reuse_key_match_reuses() {
        let mut memo = ItemReuseMemoizer::new();
        memo.set_reuse_key(ReuseKey::new(
            |c: &Channel| Value::from(c.updated_at),
            |r: &Row| r.get("updated_at").cloned().unwrap_or(Value::Null),
        ));
        let first = memo.materialize(&[row(1, "a", 1).with("updated_at", 5i64)], None, convert);
        let second = memo.materialize(&[row(1, "b", 2).with("updated_at", 5i64)], None, convert);
        assert!(Arc::ptr_eq(&first[0].item, &second[0].item));

        let third = memo.materialize(&[row(1, "b", 3).with("updated_at", 6i64)], None, convert);
        assert_eq!(third[0].item.name, "b");
    }

    #[test]
    fn test_reuse_key_wins_over_batch_conversion() {
        let mut memo = ItemReuseMemoizer::new();
        memo.set_reuse_key(ReuseKey::new(
            |c: &Channel| Value::from(c.name.clone()),
            |r: &Row| r.get("name").cloned().unwrap_or(Value::Null),
        ));
        let first = memo.materialize(&[row(1, "a", 1)], None, convert);

        let mut batch = AggregatedBatch::default();
        batch.converted.insert(1, Arc::new(Channel { id: 1, name: "a".into(), updated_at: 9 }));
        batch.touched.insert(1);
        let second = memo.materialize(&[row(1, "a", 2).with("updated_at", 9i64)], Some(&batch), convert);
        assert!(Arc::ptr_eq(&first[0].item, &second[0].item));

        let mut batch = AggregatedBatch::default();
        let renamed = Arc::new(Channel { id: 1, name: "b".into(), updated_at: 9 });
        batch.converted.insert(1, renamed.clone());
        batch.touched.insert(1);
        let third = memo.materialize(&[row(1, "b", 3)], Some(&batch), convert);
        assert!(Arc::ptr_eq(&third[0].item, &renamed));
    }

    #[test]
    fn test_conversion_failure_shrinks_result() {
        let mut memo = ItemReuseMemoizer::new();
        let entries = memo.materialize(&[row(1, "a", 1), Row::new(2)], None, convert);
        assert_eq!(entries.len(), 1);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_failed_in_batch_is_not_retried() {
        let mut memo = ItemReuseMemoizer::new();
        memo.materialize(&[row(1, "a", 1)], None, convert);

        let mut batch = AggregatedBatch::<Channel>::default();
        batch.touched.insert(1);
        batch.failed.insert(1);
        let entries = memo.materialize(&[row(1, "a", 1)], Some(&batch), convert);
        assert!(entries.is_empty());
        assert!(memo.is_empty());
    }
}
