//! Raw record contract.
//!
//! The engine only needs three things from a stored row: a stable identity, a
//! version that changes whenever the row's content changes, and read access to
//! named fields.

use crate::value::Value;
use std::sync::Arc;

/// Stable identifier of a raw record.
pub type RecordId = u64;

/// An opaque handle to one persisted row matching a query.
pub trait RawRecord: Send + Sync + 'static {
    /// Stable per-record identity.
    fn id(&self) -> RecordId;

    /// Content version; differs whenever any field changed.
    fn version(&self) -> u64;

    /// Current value of a named field.
    fn field(&self, name: &str) -> Option<&Value>;
}

impl<R: RawRecord + ?Sized> RawRecord for Arc<R> {
    #[inline]
    fn id(&self) -> RecordId {
        (**self).id()
    }

    #[inline]
    fn version(&self) -> u64 {
        (**self).version()
    }

    #[inline]
    fn field(&self, name: &str) -> Option<&Value> {
        (**self).field(name)
    }
}
