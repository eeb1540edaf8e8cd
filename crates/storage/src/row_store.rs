//! Row storage for Ripple.
//!
//! This module provides the `RowStore` struct which holds the rows of a single
//! table, keyed by record id. Rows are shared as `Arc<Row>` so live queries can
//! keep reading a row after it has been replaced or removed.

use ripple_core::{Error, RecordId, Result, Row};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Row storage for one table.
#[derive(Clone, Debug, Default)]
pub struct RowStore {
    name: String,
    rows: BTreeMap<RecordId, Arc<Row>>,
}

impl RowStore {
    /// Creates an empty store for the named table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: BTreeMap::new(),
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Inserts a row into the store.
    pub fn insert(&mut self, row: Row) -> Result<Arc<Row>> {
        let row_id = row.id();
        if self.rows.contains_key(&row_id) {
            return Err(Error::invalid_operation(format!(
                "record {} already exists in table {}",
                row_id, self.name
            )));
        }
        let row = Arc::new(row);
        self.rows.insert(row_id, row.clone());
        Ok(row)
    }

    /// Replaces a row, bumping its version past the stored one.
    ///
    /// Returns `(old, new)`.
    pub fn update(&mut self, mut new_row: Row) -> Result<(Arc<Row>, Arc<Row>)> {
        let row_id = new_row.id();
        let old = self
            .rows
            .get(&row_id)
            .cloned()
            .ok_or_else(|| Error::not_found(self.name.clone(), row_id))?;

        new_row.set_version(old.version().wrapping_add(1));
        let new_row = Arc::new(new_row);
        self.rows.insert(row_id, new_row.clone());
        Ok((old, new_row))
    }

    /// Puts back a previously stored row as is. Used by rollback.
    pub fn restore(&mut self, row: Arc<Row>) {
        self.rows.insert(row.id(), row);
    }

    /// Deletes a row from the store.
    pub fn delete(&mut self, row_id: RecordId) -> Result<Arc<Row>> {
        self.rows
            .remove(&row_id)
            .ok_or_else(|| Error::not_found(self.name.clone(), row_id))
    }

    /// Gets a row by ID.
    pub fn get(&self, row_id: RecordId) -> Option<Arc<Row>> {
        self.rows.get(&row_id).cloned()
    }

    /// Returns an iterator over all rows in id order.
    pub fn scan(&self) -> impl Iterator<Item = &Arc<Row>> + '_ {
        self.rows.values()
    }

    /// Returns all row IDs.
    pub fn row_ids(&self) -> Vec<RecordId> {
        self.rows.keys().copied().collect()
    }

    /// Gets multiple rows by IDs.
    pub fn get_many(&self, row_ids: &[RecordId]) -> Vec<Option<Arc<Row>>> {
        row_ids.iter().map(|id| self.rows.get(id).cloned()).collect()
    }

    /// Clears all rows.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
