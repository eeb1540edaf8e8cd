//! Row structure for Ripple records.
//!
//! A `Row` is the concrete raw record kept by the reference storage engine.
//! Fields are addressed by name so native sort descriptors can refer to them.

use crate::record::{RawRecord, RecordId};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global row ID counter for generating unique row IDs.
static NEXT_ROW_ID: AtomicU64 = AtomicU64::new(1);

/// Gets the next unique row ID.
pub fn next_row_id() -> RecordId {
    NEXT_ROW_ID.fetch_add(1, Ordering::SeqCst)
}

/// Sets the next row ID only if it's greater than the current value.
pub fn set_next_row_id_if_greater(id: RecordId) {
    NEXT_ROW_ID.fetch_max(id, Ordering::SeqCst);
}

/// A persisted row.
#[derive(Clone, Debug)]
pub struct Row {
    /// Unique identifier for this row.
    id: RecordId,
    /// Version number for change detection. Incremented on each update.
    version: u64,
    /// Field values by name.
    fields: BTreeMap<String, Value>,
}

impl Row {
    /// Creates a new row with the given ID and no fields.
    /// Version defaults to 1 for new rows.
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            version: 1,
            fields: BTreeMap::new(),
        }
    }

    /// Creates a new row with an automatically assigned ID.
    pub fn create() -> Self {
        Self::new(next_row_id())
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns the row ID.
    #[inline]
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Returns the version number.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Sets the version number.
    #[inline]
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Increments the version number and returns the new value.
    #[inline]
    pub fn increment_version(&mut self) -> u64 {
        self.version = self.version.wrapping_add(1);
        self.version
    }

    /// Gets a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets a field value, returning the previous one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Returns the number of fields in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if this row has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.fields == other.fields
    }
}

impl RawRecord for Row {
    fn id(&self) -> RecordId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}
