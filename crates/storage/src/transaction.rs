//! Write transactions for a Ripple store.
//!
//! A `Transaction` borrows the table cache for its whole lifetime, applies
//! changes eagerly and journals them so they can be rolled back or turned
//! into per-table diffs on commit.

use crate::cache::TableCache;
use crate::journal::{Journal, JournalEntry, TableDiff};
use ripple_core::{Error, RecordId, Result, Row};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global transaction ID counter.
static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction ID type.
pub type TransactionId = u64;

/// Transaction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// A write transaction.
pub struct Transaction<'a> {
    /// Unique transaction ID.
    id: TransactionId,
    /// The tables being written.
    cache: &'a mut TableCache,
    /// Journal for tracking changes.
    journal: Journal,
    /// Current state.
    state: TransactionState,
}

impl<'a> Transaction<'a> {
    /// Begins a transaction over `cache`.
    pub fn begin(cache: &'a mut TableCache) -> Self {
        Self {
            id: NEXT_TX_ID.fetch_add(1, Ordering::SeqCst),
            cache,
            journal: Journal::new(),
            state: TransactionState::Active,
        }
    }

    /// Returns the transaction ID.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true if the transaction is active.
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    fn check_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(Error::invalid_operation("transaction is not active"));
        }
        Ok(())
    }

    /// Reads the current state of a row, including this transaction's writes.
    pub fn get(&self, table: &str, row_id: RecordId) -> Option<Arc<Row>> {
        self.cache.get_row(table, row_id)
    }

    /// Inserts a row.
    pub fn insert(&mut self, table: &str, row: Row) -> Result<RecordId> {
        self.check_active()?;

        let store = self
            .cache
            .get_table_mut(table)
            .ok_or_else(|| Error::table_not_found(table))?;
        let row = store.insert(row)?;
        let row_id = row.id();

        self.journal.record_insert(table, row);
        Ok(row_id)
    }

    /// Replaces the row with the same id. The stored version is bumped.
    pub fn update(&mut self, table: &str, row: Row) -> Result<()> {
        self.check_active()?;

        let store = self
            .cache
            .get_table_mut(table)
            .ok_or_else(|| Error::table_not_found(table))?;
        let (old, new) = store.update(row)?;

        self.journal.record_update(table, old, new);
        Ok(())
    }

    /// Edits a copy of the stored row and writes it back.
    pub fn modify<F>(&mut self, table: &str, row_id: RecordId, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Row),
    {
        let current = self
            .get(table, row_id)
            .ok_or_else(|| Error::not_found(table, row_id))?;
        let mut row = (*current).clone();
        edit(&mut row);
        self.update(table, row)
    }

    /// Deletes a row.
    pub fn delete(&mut self, table: &str, row_id: RecordId) -> Result<Arc<Row>> {
        self.check_active()?;

        let store = self
            .cache
            .get_table_mut(table)
            .ok_or_else(|| Error::table_not_found(table))?;
        let row = store.delete(row_id)?;

        self.journal.record_delete(table, row.clone());
        Ok(row)
    }

    /// Commits the transaction and returns the per-table diffs.
    pub fn commit(mut self) -> Result<Vec<TableDiff>> {
        self.check_active()?;
        self.state = TransactionState::Committed;
        Ok(self.journal.commit())
    }

    /// Rolls back the transaction.
    pub fn rollback(mut self) -> Result<()> {
        self.check_active()?;
        self.state = TransactionState::RolledBack;
        self.journal.rollback(self.cache)
    }

    /// Returns the journal entries.
    pub fn get_changes(&self) -> &[JournalEntry] {
        self.journal.get_entries()
    }
}
