//! Journal for tracking changes in a Ripple store.
//!
//! This module provides the `Journal` struct for recording the changes of one
//! write transaction, and the per-table `TableDiff` that is handed to live
//! queries after commit.

use crate::cache::TableCache;
use ripple_core::{RecordId, Result, Row};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single journal entry representing a change.
#[derive(Clone, Debug)]
pub enum JournalEntry {
    /// A row was inserted.
    Insert { table: String, row: Arc<Row> },
    /// A row was updated.
    Update {
        table: String,
        old: Arc<Row>,
        new: Arc<Row>,
    },
    /// A row was deleted.
    Delete { table: String, row: Arc<Row> },
}

impl JournalEntry {
    /// Returns the table name for this entry.
    pub fn table(&self) -> &str {
        match self {
            JournalEntry::Insert { table, .. } => table,
            JournalEntry::Update { table, .. } => table,
            JournalEntry::Delete { table, .. } => table,
        }
    }

    /// Returns the row ID for this entry.
    pub fn row_id(&self) -> RecordId {
        match self {
            JournalEntry::Insert { row, .. } => row.id(),
            JournalEntry::Update { old, .. } => old.id(),
            JournalEntry::Delete { row, .. } => row.id(),
        }
    }
}

/// Net changes to a single table within one transaction.
#[derive(Clone, Debug, Default)]
pub struct TableDiff {
    /// Table name.
    table_name: String,
    /// Added rows (row_id → row).
    added: BTreeMap<RecordId, Arc<Row>>,
    /// Modified rows (row_id → (old, new)).
    modified: BTreeMap<RecordId, (Arc<Row>, Arc<Row>)>,
    /// Deleted rows (row_id → row).
    deleted: BTreeMap<RecordId, Arc<Row>>,
}

impl TableDiff {
    /// Creates a new table diff.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            added: BTreeMap::new(),
            modified: BTreeMap::new(),
            deleted: BTreeMap::new(),
        }
    }

    /// Returns the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Records an addition.
    pub fn add(&mut self, row: Arc<Row>) {
        let row_id = row.id();
        // Deleted then re-added within one transaction is a modification.
        if let Some(old_row) = self.deleted.remove(&row_id) {
            self.modified.insert(row_id, (old_row, row));
        } else {
            self.added.insert(row_id, row);
        }
    }

    /// Records a modification.
    pub fn modify(&mut self, old: Arc<Row>, new: Arc<Row>) {
        let row_id = old.id();
        if self.added.contains_key(&row_id) {
            self.added.insert(row_id, new);
        } else if let Some((original_old, _)) = self.modified.get(&row_id) {
            let original = original_old.clone();
            self.modified.insert(row_id, (original, new));
        } else {
            self.modified.insert(row_id, (old, new));
        }
    }

    /// Records a deletion.
    pub fn delete(&mut self, row: Arc<Row>) {
        let row_id = row.id();
        if self.added.remove(&row_id).is_some() {
            return;
        }
        if let Some((old_row, _)) = self.modified.remove(&row_id) {
            self.deleted.insert(row_id, old_row);
        } else {
            self.deleted.insert(row_id, row);
        }
    }

    /// Returns added rows.
    pub fn get_added(&self) -> &BTreeMap<RecordId, Arc<Row>> {
        &self.added
    }

    /// Returns modified rows.
    pub fn get_modified(&self) -> &BTreeMap<RecordId, (Arc<Row>, Arc<Row>)> {
        &self.modified
    }

    /// Returns deleted rows.
    pub fn get_deleted(&self) -> &BTreeMap<RecordId, Arc<Row>> {
        &self.deleted
    }

    /// Returns the number of changed rows.
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Returns true if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Rows that exist after the transaction, added or modified, by id.
    pub fn upserts(&self) -> impl Iterator<Item = &Arc<Row>> + '_ {
        self.added
            .values()
            .chain(self.modified.values().map(|(_, new)| new))
    }
}

/// Journal for tracking changes within a transaction.
#[derive(Debug, Default)]
pub struct Journal {
    /// Table diffs (table name → diff).
    table_diffs: BTreeMap<String, TableDiff>,
    /// Ordered list of entries for rollback.
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self {
            table_diffs: BTreeMap::new(),
            entries: Vec::new(),
        }
    }

    /// Records an insert operation.
    pub fn record_insert(&mut self, table: &str, row: Arc<Row>) {
        self.diff_mut(table).add(row.clone());
        self.entries.push(JournalEntry::Insert {
            table: table.into(),
            row,
        });
    }

    /// Records an update operation.
    pub fn record_update(&mut self, table: &str, old: Arc<Row>, new: Arc<Row>) {
        self.diff_mut(table).modify(old.clone(), new.clone());
        self.entries.push(JournalEntry::Update {
            table: table.into(),
            old,
            new,
        });
    }

    /// Records a delete operation.
    pub fn record_delete(&mut self, table: &str, row: Arc<Row>) {
        self.diff_mut(table).delete(row.clone());
        self.entries.push(JournalEntry::Delete {
            table: table.into(),
            row,
        });
    }

    fn diff_mut(&mut self, table: &str) -> &mut TableDiff {
        self.table_diffs
            .entry(table.to_string())
            .or_insert_with(|| TableDiff::new(table))
    }

    /// Returns all journal entries.
    pub fn get_entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Returns the table diff for a table.
    pub fn get_table_diff(&self, table: &str) -> Option<&TableDiff> {
        self.table_diffs.get(table)
    }

    /// Returns true if the journal is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finalizes the journal and returns the non-empty table diffs.
    ///
    /// Changes are already applied to the cache during the transaction.
    pub fn commit(&mut self) -> Vec<TableDiff> {
        self.entries.clear();
        std::mem::take(&mut self.table_diffs)
            .into_values()
            .filter(|diff| !diff.is_empty())
            .collect()
    }

    /// Rolls back the journal changes.
    pub fn rollback(&mut self, cache: &mut TableCache) -> Result<()> {
        for entry in self.entries.iter().rev() {
            match entry {
                JournalEntry::Insert { table, row } => {
                    if let Some(store) = cache.get_table_mut(table) {
                        let _ = store.delete(row.id());
                    }
                }
                JournalEntry::Update { table, old, .. } => {
                    if let Some(store) = cache.get_table_mut(table) {
                        store.restore(old.clone());
                    }
                }
                JournalEntry::Delete { table, row } => {
                    if let Some(store) = cache.get_table_mut(table) {
                        store.restore(row.clone());
                    }
                }
            }
        }

        self.clear();
        Ok(())
    }

    /// Clears the journal without applying changes.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.table_diffs.clear();
    }
}
