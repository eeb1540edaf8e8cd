//! Sort criteria for observed collections.
//!
//! A criterion is either native, meaning the storage engine can evaluate it
//! through a [`SortDescriptor`], or runtime-only, meaning it can only be
//! evaluated over materialized items. Both kinds compare through
//! [`compare_values`], so absent values sort last in either direction.

use ripple_core::{compare_values, SortDescriptor, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// In-memory comparison of two items.
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Extracts a comparable proxy value from an item.
pub type Extractor<T> = Arc<dyn Fn(&T) -> Option<Value> + Send + Sync>;

/// A sort criterion over items of type `T`.
pub trait SortSpec<T>: Send + Sync {
    /// The native descriptor, if the storage engine can sort by this key.
    fn sort_descriptor(&self, ascending: bool) -> Option<SortDescriptor>;

    /// The in-memory comparator for this key.
    fn comparator(&self, ascending: bool) -> Option<Comparator<T>>;

    /// True iff the key has no native descriptor.
    fn requires_runtime_sorting(&self) -> bool {
        self.sort_descriptor(true).is_none()
    }
}

/// A sort key backed by a field extractor.
pub struct SortField<T> {
    name: String,
    native: bool,
    extract: Extractor<T>,
}

impl<T> SortField<T> {
    /// A key the storage engine sorts by natively through the raw field
    /// `field`. `extract` must read the same value from the item.
    pub fn native<F>(field: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&T) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            name: field.into(),
            native: true,
            extract: Arc::new(extract),
        }
    }

    /// A key that is only evaluated over materialized items.
    pub fn runtime<F>(name: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&T) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            native: false,
            extract: Arc::new(extract),
        }
    }

    /// Returns the key name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T: 'static> SortSpec<T> for SortField<T> {
    fn sort_descriptor(&self, ascending: bool) -> Option<SortDescriptor> {
        self.native
            .then(|| SortDescriptor::new(self.name.clone(), ascending))
    }

    fn comparator(&self, ascending: bool) -> Option<Comparator<T>> {
        let extract = self.extract.clone();
        Some(Arc::new(move |a: &T, b: &T| {
            compare_values(extract(a).as_ref(), extract(b).as_ref(), ascending)
        }))
    }
}

impl<T> fmt::Debug for SortField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortField")
            .field("name", &self.name)
            .field("native", &self.native)
            .finish()
    }
}

/// A sort key with a direction.
pub struct SortValue<T> {
    pub key: Arc<dyn SortSpec<T>>,
    pub ascending: bool,
}

impl<T> Clone for SortValue<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            ascending: self.ascending,
        }
    }
}

impl<T> SortValue<T> {
    /// Creates a sort value.
    pub fn new(key: impl SortSpec<T> + 'static, ascending: bool) -> Self {
        Self {
            key: Arc::new(key),
            ascending,
        }
    }

    /// Ascending sort value.
    pub fn asc(key: impl SortSpec<T> + 'static) -> Self {
        Self::new(key, true)
    }

    /// Descending sort value.
    pub fn desc(key: impl SortSpec<T> + 'static) -> Self {
        Self::new(key, false)
    }

    #[inline]
    pub fn sort_descriptor(&self) -> Option<SortDescriptor> {
        self.key.sort_descriptor(self.ascending)
    }

    #[inline]
    pub fn comparator(&self) -> Option<Comparator<T>> {
        self.key.comparator(self.ascending)
    }

    #[inline]
    pub fn requires_runtime_sorting(&self) -> bool {
        self.key.requires_runtime_sorting()
    }
}

impl<T> fmt::Debug for SortValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortValue")
            .field("descriptor", &self.sort_descriptor())
            .field("ascending", &self.ascending)
            .finish()
    }
}

/// Composes criteria into one comparator: each criterion is consulted in
/// turn and the first non-equal result wins.
///
/// Items equal under every criterion compare equal; a stable sort keeps them
/// in input order.
pub fn compose<T: 'static>(sorting: &[SortValue<T>]) -> Comparator<T> {
    let comparators: Vec<Comparator<T>> = sorting.iter().filter_map(SortValue::comparator).collect();
    Arc::new(move |a: &T, b: &T| {
        comparators
            .iter()
            .map(|cmp| cmp(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

/// Native descriptors of `sorting`, in order. Runtime-only keys are skipped.
pub fn native_descriptors<T>(sorting: &[SortValue<T>]) -> Vec<SortDescriptor> {
    sorting.iter().filter_map(SortValue::sort_descriptor).collect()
}

/// True if the native descriptors of `sorting` lead `query_sort`, so the
/// engine's order is already sorted by every native criterion.
pub fn matches_native_order<T>(sorting: &[SortValue<T>], query_sort: &[SortDescriptor]) -> bool {
    let native = native_descriptors(sorting);
    query_sort.starts_with(&native)
}

/// True if any criterion needs runtime sorting.
pub fn requires_runtime_sorting<T>(sorting: &[SortValue<T>]) -> bool {
    sorting.iter().any(SortValue::requires_runtime_sorting)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Channel {
        name: &'static str,
        members: Option<i64>,
    }

    fn name() -> SortField<Channel> {
        SortField::native("name", |c: &Channel| Some(Value::from(c.name)))
    }

    fn members() -> SortField<Channel> {
        SortField::runtime("members", |c: &Channel| c.members.map(Value::from))
    }

    #[test]
    fn test_matches_native_order() {
        let sorting = vec![SortValue::desc(name()), SortValue::asc(members())];
        assert!(matches_native_order(&sorting, &[SortDescriptor::desc("name")]));
        assert!(matches_native_order(
            &sorting,
            &[SortDescriptor::desc("name"), SortDescriptor::asc("created_at")]
        ));
        assert!(!matches_native_order(&sorting, &[SortDescriptor::asc("name")]));
        assert!(!matches_native_order(&sorting, &[]));
        assert!(matches_native_order(&[SortValue::asc(members())], &[SortDescriptor::asc("name")]));
    }

    #[test]
    fn test_native_field_has_descriptor() {
        let key = name();
        assert_eq!(key.sort_descriptor(false), Some(SortDescriptor::desc("name")));
        assert!(!key.requires_runtime_sorting());
        assert!(key.comparator(true).is_some());
    }

    #[test]
    fn test_runtime_field_has_no_descriptor() {
        let key = members();
        assert_eq!(key.sort_descriptor(true), None);
        assert!(key.requires_runtime_sorting());
    }

    #[test]
    fn test_absent_sorts_last_both_directions() {
        let a = Channel { name: "a", members: None };
        let b = Channel { name: "b", members: Some(3) };
        for ascending in [true, false] {
            let cmp = members().comparator(ascending).unwrap();
            assert_eq!(cmp(&a, &b), Ordering::Greater);
            assert_eq!(cmp(&b, &a), Ordering::Less);
        }
    }

    #[test]
    fn test_compose_falls_through() {
        let sorting = vec![SortValue::desc(members()), SortValue::asc(name())];
        let cmp = compose(&sorting);

        let a = Channel { name: "a", members: Some(1) };
        let b = Channel { name: "b", members: Some(1) };
        let c = Channel { name: "c", members: Some(5) };
        assert_eq!(cmp(&a, &b), Ordering::Less);
        assert_eq!(cmp(&c, &a), Ordering::Less);
        assert_eq!(cmp(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_sorting_helpers() {
        let sorting = vec![SortValue::desc(name()), SortValue::asc(members())];
        assert_eq!(native_descriptors(&sorting), vec![SortDescriptor::desc("name")]);
        assert!(requires_runtime_sorting(&sorting));
        assert!(!requires_runtime_sorting(&sorting[..1]));
    }
}
