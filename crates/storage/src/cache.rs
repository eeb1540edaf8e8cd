//! Cache management for Ripple.
//!
//! This module provides the `TableCache` struct which manages multiple table stores.

use crate::row_store::RowStore;
use ripple_core::{Error, RecordId, Result, Row};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cache for managing multiple table stores.
#[derive(Debug, Default)]
pub struct TableCache {
    /// Table name → RowStore mapping.
    tables: BTreeMap<String, RowStore>,
}

impl TableCache {
    /// Creates a new empty table cache.
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
        }
    }

    /// Creates a table in the cache.
    pub fn create_table(&mut self, name: &str) -> Result<()> {
        if self.tables.contains_key(name) {
            return Err(Error::invalid_operation(format!(
                "table already exists: {}",
                name
            )));
        }
        self.tables.insert(name.to_string(), RowStore::new(name));
        Ok(())
    }

    /// Drops a table from the cache.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        if self.tables.remove(name).is_none() {
            return Err(Error::table_not_found(name));
        }
        Ok(())
    }

    /// Gets a reference to a table store.
    pub fn get_table(&self, name: &str) -> Option<&RowStore> {
        self.tables.get(name)
    }

    /// Gets a mutable reference to a table store.
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut RowStore> {
        self.tables.get_mut(name)
    }

    /// Returns the number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Returns all table names.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }

    /// Returns the total row count across all tables.
    pub fn total_row_count(&self) -> usize {
        self.tables.values().map(|t| t.len()).sum()
    }

    /// Gets a row by table name and row ID.
    pub fn get_row(&self, table: &str, row_id: RecordId) -> Option<Arc<Row>> {
        self.tables.get(table).and_then(|t| t.get(row_id))
    }

    /// Checks if a table exists.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Clears all tables, keeping their definitions.
    pub fn clear(&mut self) {
        for store in self.tables.values_mut() {
            store.clear();
        }
    }
}
