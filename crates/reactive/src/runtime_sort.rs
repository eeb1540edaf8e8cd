//! Final ordering of materialized entries.

use crate::memoize::Entry;
use crate::sort::{compose, requires_runtime_sorting, SortValue};

/// Applies runtime-only sort criteria on top of the native order.
pub struct RuntimeSortMerger;

impl RuntimeSortMerger {
    /// Returns `entries` in final order.
    ///
    /// If every criterion is native the engine's order is authoritative and
    /// `entries` is returned unchanged. Otherwise the whole list is stably
    /// re-sorted by all criteria, so entries equal under every criterion keep
    /// their native order.
    pub fn merge<T: 'static>(mut entries: Vec<Entry<T>>, sorting: &[SortValue<T>]) -> Vec<Entry<T>> {
        if requires_runtime_sorting(sorting) {
            let cmp = compose(sorting);
            entries.sort_by(|a, b| cmp(a.item.as_ref(), b.item.as_ref()));
        }
        entries
    }
}
