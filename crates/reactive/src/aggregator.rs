//! Raw event aggregation.
//!
//! `ChangeAggregator` is installed as the live query's delegate. It buffers
//! the raw per-record events of one engine transaction and, when the
//! transaction ends, converts them into a single batch of `ListChange`s.
//!
//! Conversion is lazy and happens at most once per record and batch. A record
//! that fails to convert is logged and its change is dropped, but the record
//! stays in `touched` and `failed` so the observer can drop its stale item.
//! A batch that touched no record is not delivered.

use crate::change::ListChange;
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use ripple_core::{ChangeKind, ConversionError, RawRecord, RecordId, ResultsDelegate};
use ripple_incremental::{ChangeBatch, RecordChange};
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Converts a raw record into an item.
pub type ConvertFn<R, T> = Arc<dyn Fn(&R) -> std::result::Result<T, ConversionError> + Send + Sync>;

type WillChangeFn = Arc<dyn Fn() + Send + Sync>;
type DidChangeFn<T> = Arc<dyn Fn(AggregatedBatch<T>) + Send + Sync>;

/// The outcome of one engine transaction.
pub struct AggregatedBatch<T> {
    /// Changes in delivery order.
    pub changes: Vec<ListChange<Arc<T>>>,
    /// Record id of each entry in `changes`.
    pub ids: Vec<RecordId>,
    /// Items converted while building the batch, by record id.
    pub converted: HashMap<RecordId, Arc<T>>,
    /// Every record the engine reported, including dropped ones.
    pub touched: HashSet<RecordId>,
    /// Records whose conversion failed.
    pub failed: HashSet<RecordId>,
}

impl<T> Default for AggregatedBatch<T> {
    fn default() -> Self {
        Self {
            changes: Vec::new(),
            ids: Vec::new(),
            converted: HashMap::new(),
            touched: HashSet::new(),
            failed: HashSet::new(),
        }
    }
}

impl<T> AggregatedBatch<T> {
    /// Returns true if the batch carries no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the number of changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    fn push(&mut self, id: RecordId, change: ListChange<Arc<T>>) {
        self.ids.push(id);
        self.changes.push(change);
    }
}

impl<T> fmt::Debug for AggregatedBatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatedBatch")
            .field("ids", &self.ids)
            .field("touched", &self.touched.len())
            .field("failed", &self.failed.len())
            .finish()
    }
}

/// Turns raw live-query events into `ListChange` batches.
pub struct ChangeAggregator<R, T> {
    convert: ConvertFn<R, T>,
    pending: Mutex<ChangeBatch<R>>,
    will_change: Mutex<Option<WillChangeFn>>,
    did_change: Mutex<Option<DidChangeFn<T>>>,
}

impl<R, T> ChangeAggregator<R, T>
where
    R: RawRecord + Clone,
    T: Send + Sync + 'static,
{
    /// Creates an aggregator using `convert` for every reported record.
    pub fn new(convert: ConvertFn<R, T>) -> Self {
        Self {
            convert,
            pending: Mutex::new(Vec::new()),
            will_change: Mutex::new(None),
            did_change: Mutex::new(None),
        }
    }

    /// Sets the callback invoked when a batch starts.
    pub fn on_will_change<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.will_change.lock() = Some(Arc::new(f));
    }

    /// Sets the callback receiving finished batches that touched a record.
    pub fn on_did_change<F>(&self, f: F)
    where
        F: Fn(AggregatedBatch<T>) + Send + Sync + 'static,
    {
        *self.did_change.lock() = Some(Arc::new(f));
    }

    /// Starts a batch, discarding events of an unfinished one.
    pub fn begin_batch(&self) {
        self.pending.lock().clear();
        let callback = self.will_change.lock().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Buffers one raw event.
    pub fn record_changed(&self, record: &R, index: Option<usize>, kind: ChangeKind, new_index: Option<usize>) {
        self.pending
            .lock()
            .push(RecordChange::new(record.clone(), kind, index, new_index));
    }

    /// Ends the batch and delivers it if the engine reported any record,
    /// even when every change was dropped.
    pub fn end_batch(&self) {
        let events = std::mem::take(&mut *self.pending.lock());
        let batch = self.aggregate(events);
        trace!(changes = batch.len(), touched = batch.touched.len(), "batch aggregated");
        if batch.touched.is_empty() {
            return;
        }
        let callback = self.did_change.lock().clone();
        if let Some(callback) = callback {
            callback(batch);
        }
    }

    /// Number of buffered events.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Converts buffered events into a batch.
    ///
    /// An update to a record that also moved is folded into the move.
    pub fn aggregate(&self, events: ChangeBatch<R>) -> AggregatedBatch<T> {
        let moved: HashSet<RecordId> = events
            .iter()
            .filter(|e| e.kind == ChangeKind::Move)
            .map(|e| e.record.id())
            .collect();

        let mut batch = AggregatedBatch::default();
        for event in events {
            let id = event.record.id();
            batch.touched.insert(id);

            if !event.has_required_indices() {
                warn!(record = id, kind = %event.kind, "dropping change without required index");
                continue;
            }
            if event.kind == ChangeKind::Update && moved.contains(&id) {
                continue;
            }
            let Some(item) = self.convert_once(&event.record, &mut batch) else {
                continue;
            };

            let change = match (event.kind, event.index, event.new_index) {
                (ChangeKind::Insert, _, Some(index)) => ListChange::Insert { item, index },
                (ChangeKind::Delete, Some(index), _) => ListChange::Remove { item, index },
                (ChangeKind::Update, Some(index), _) => ListChange::Update { item, index },
                (ChangeKind::Move, Some(from), Some(to)) => ListChange::Move { item, from, to },
                _ => continue,
            };
            batch.push(id, change);
        }
        batch
    }

    fn convert_once(&self, record: &R, batch: &mut AggregatedBatch<T>) -> Option<Arc<T>> {
        let id = record.id();
        if let Some(item) = batch.converted.get(&id) {
            return Some(item.clone());
        }
        if batch.failed.contains(&id) {
            return None;
        }
        match (self.convert)(record) {
            Ok(item) => {
                let item = Arc::new(item);
                batch.converted.insert(id, item.clone());
                Some(item)
            }
            Err(e) => {
                warn!(record = id, error = %e, "dropping change: conversion failed");
                batch.failed.insert(id);
                None
            }
        }
    }
}

impl<R, T> ResultsDelegate<R> for ChangeAggregator<R, T>
where
    R: RawRecord + Clone,
    T: Send + Sync + 'static,
{
    fn will_change(&self) {
        self.begin_batch();
    }

    fn did_change_record(&self, record: &R, index: Option<usize>, kind: ChangeKind, new_index: Option<usize>) {
        self.record_changed(record, index, kind, new_index);
    }

    fn did_change_content(&self) {
        self.end_batch();
    }
}
