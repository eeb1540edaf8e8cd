//! Declarative queries: table, filter and native sort descriptors.

use crate::cache::TableCache;
use ripple_core::{compare_values, Error, RawRecord, Result, Row, SortDescriptor, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Row predicate.
pub type Filter = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

/// A query over one table.
#[derive(Clone)]
pub struct QuerySpec {
    table: String,
    filter: Option<Filter>,
    sort: Vec<SortDescriptor>,
}

impl QuerySpec {
    /// Creates a query matching every row of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            sort: Vec::new(),
        }
    }

    /// Restricts the query to rows matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Row) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(predicate));
        self
    }

    /// Restricts the query to rows whose `field` equals `value`.
    pub fn filter_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        self.filter(move |row| row.get(&field) == Some(&value))
    }

    /// Appends a native sort descriptor.
    pub fn sort_by(mut self, descriptor: SortDescriptor) -> Self {
        self.sort.push(descriptor);
        self
    }

    /// Appends several native sort descriptors.
    pub fn sort_by_all(mut self, descriptors: impl IntoIterator<Item = SortDescriptor>) -> Self {
        self.sort.extend(descriptors);
        self
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the sort descriptors.
    pub fn sort(&self) -> &[SortDescriptor] {
        &self.sort
    }

    /// Rejects queries without a deterministic order.
    pub fn validate(&self) -> Result<()> {
        if self.sort.is_empty() {
            return Err(Error::invalid_query(format!(
                "query on `{}` needs at least one sort descriptor",
                self.table
            )));
        }
        Ok(())
    }

    /// Returns true if `row` passes the filter.
    pub fn matches(&self, row: &Row) -> bool {
        self.filter.as_ref().map_or(true, |f| f(row))
    }

    /// Native order: each descriptor in turn, then ascending record id.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for descriptor in &self.sort {
            let cmp = compare_values(
                a.field(&descriptor.field),
                b.field(&descriptor.field),
                descriptor.ascending,
            );
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        a.id().cmp(&b.id())
    }

    /// Sorts rows into native order.
    pub fn sort_rows(&self, rows: &mut [Arc<Row>]) {
        rows.sort_by(|a, b| self.compare(a, b));
    }

    /// Runs the query against `cache`.
    pub fn evaluate(&self, cache: &TableCache) -> Result<Vec<Arc<Row>>> {
        let store = cache
            .get_table(&self.table)
            .ok_or_else(|| Error::table_not_found(&self.table))?;
        let mut rows: Vec<Arc<Row>> = store.scan().filter(|row| self.matches(row)).cloned().collect();
        self.sort_rows(&mut rows);
        Ok(rows)
    }
}

impl fmt::Debug for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySpec")
            .field("table", &self.table)
            .field("filtered", &self.filter.is_some())
            .field("sort", &self.sort)
            .finish()
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table)?;
        if self.filter.is_some() {
            write!(f, " where <filter>")?;
        }
        for (i, d) in self.sort.iter().enumerate() {
            let sep = if i == 0 { " order by " } else { ", " };
            write!(f, "{}{} {}", sep, d.field, if d.ascending { "asc" } else { "desc" })?;
        }
        Ok(())
    }
}
