//! Raw per-record change events.
//!
//! A `RecordChange` is what a live query reports for one record during one
//! engine transaction. Indices follow the sequential convention of
//! [`crate::diff`]: each change's indices refer to the list as it is when that
//! change is applied.

use ripple_core::{ChangeKind, RawRecord, RecordId};

/// A raw change to a single record.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordChange<R> {
    /// The record, as readable at the time of the event.
    pub record: R,
    /// What happened.
    pub kind: ChangeKind,
    /// Position before the change (delete, update, move).
    pub index: Option<usize>,
    /// Position after the change (insert, move).
    pub new_index: Option<usize>,
}

impl<R> RecordChange<R> {
    /// Creates a change with explicit indices.
    #[inline]
    pub fn new(record: R, kind: ChangeKind, index: Option<usize>, new_index: Option<usize>) -> Self {
        Self {
            record,
            kind,
            index,
            new_index,
        }
    }

    /// Creates an insertion at `new_index`.
    #[inline]
    pub fn insert(record: R, new_index: usize) -> Self {
        Self::new(record, ChangeKind::Insert, None, Some(new_index))
    }

    /// Creates a deletion at `index`.
    #[inline]
    pub fn delete(record: R, index: usize) -> Self {
        Self::new(record, ChangeKind::Delete, Some(index), None)
    }

    /// Creates an in-place update at `index`.
    #[inline]
    pub fn update(record: R, index: usize) -> Self {
        Self::new(record, ChangeKind::Update, Some(index), None)
    }

    /// Creates a move from `from` to `to`.
    #[inline]
    pub fn moved(record: R, from: usize, to: usize) -> Self {
        Self::new(record, ChangeKind::Move, Some(from), Some(to))
    }

    /// Returns true if every index this kind needs is present.
    pub fn has_required_indices(&self) -> bool {
        match self.kind {
            ChangeKind::Insert => self.new_index.is_some(),
            ChangeKind::Delete | ChangeKind::Update => self.index.is_some(),
            ChangeKind::Move => self.index.is_some() && self.new_index.is_some(),
        }
    }

    /// Maps the record to a new type.
    #[inline]
    pub fn map<U, F>(self, f: F) -> RecordChange<U>
    where
        F: FnOnce(R) -> U,
    {
        RecordChange {
            record: f(self.record),
            kind: self.kind,
            index: self.index,
            new_index: self.new_index,
        }
    }
}

impl<R: RawRecord> RecordChange<R> {
    /// Identity of the changed record.
    #[inline]
    pub fn record_id(&self) -> RecordId {
        self.record.id()
    }
}

/// A batch of raw changes from one engine transaction.
pub type ChangeBatch<R> = Vec<RecordChange<R>>;

/// Extension trait for working with change batches.
pub trait ChangeBatchExt<R> {
    /// Drops changes that lack an index their kind requires.
    fn compact(self) -> Self;

    /// Net change in collection length (inserts minus deletes).
    fn net_count(&self) -> i64;
}

impl<R> ChangeBatchExt<R> for ChangeBatch<R> {
    fn compact(self) -> Self {
        self.into_iter().filter(|c| c.has_required_indices()).collect()
    }

    fn net_count(&self) -> i64 {
        self.iter()
            .map(|c| match c.kind {
                ChangeKind::Insert => 1,
                ChangeKind::Delete => -1,
                ChangeKind::Update | ChangeKind::Move => 0,
            })
            .sum()
    }
}
