//! Live query registry.
//!
//! This module provides `QueryRegistry` which tracks live queries by table
//! and routes committed table diffs to them.

use crate::live::StoreLiveQuery;
use hashbrown::HashMap;
use std::sync::{Arc, Weak};

/// Unique identifier for a registered query.
pub type QueryId = u64;

/// Tracks live queries without keeping them alive.
pub struct QueryRegistry {
    /// Table name -> queries reading it
    table_queries: HashMap<String, Vec<Weak<StoreLiveQuery>>>,
    /// Query ID -> query reference (for unregistration)
    queries: HashMap<QueryId, Weak<StoreLiveQuery>>,
    /// Next query ID to assign
    next_id: QueryId,
}

impl Default for QueryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryRegistry {
    /// Creates a new query registry.
    pub fn new() -> Self {
        Self {
            table_queries: HashMap::new(),
            queries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a query and returns its ID.
    pub fn register(&mut self, query: &Arc<StoreLiveQuery>) -> QueryId {
        let id = self.next_id;
        self.next_id += 1;

        let weak = Arc::downgrade(query);
        self.table_queries
            .entry(query.spec().table().to_string())
            .or_default()
            .push(weak.clone());
        self.queries.insert(id, weak);

        id
    }

    /// Unregisters a query by ID.
    ///
    /// Returns true if the query was found and removed.
    pub fn unregister(&mut self, query_id: QueryId) -> bool {
        match self.queries.remove(&query_id) {
            Some(weak) => {
                for queries in self.table_queries.values_mut() {
                    queries.retain(|w| !w.ptr_eq(&weak));
                }
                self.cleanup();
                true
            }
            None => false,
        }
    }

    /// Returns the live queries reading `table`.
    pub fn queries_for(&self, table: &str) -> Vec<Arc<StoreLiveQuery>> {
        self.table_queries
            .get(table)
            .map(|v| v.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Returns the number of registered queries still alive.
    pub fn query_count(&self) -> usize {
        self.queries.values().filter(|w| w.strong_count() > 0).count()
    }

    /// Returns true if there are no live registered queries.
    pub fn is_empty(&self) -> bool {
        self.query_count() == 0
    }

    /// Cleans up stale weak references.
    pub fn cleanup(&mut self) {
        for queries in self.table_queries.values_mut() {
            queries.retain(|w| w.strong_count() > 0);
        }
        self.table_queries.retain(|_, v| !v.is_empty());
        self.queries.retain(|_, w| w.strong_count() > 0);
    }
}
