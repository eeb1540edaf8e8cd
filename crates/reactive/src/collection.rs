//! Index-accessible item collections.
//!
//! A `StreamCollection` is an immutable snapshot of an observer's items. It is
//! cheap to clone, and every clone hands out the same `Arc` per index.
//! Snapshots are built eagerly: the memoizer has already produced every item
//! by the time a batch is diffed.

use std::fmt;
use std::sync::Arc;

/// An ordered, index-accessible snapshot of items.
pub struct StreamCollection<T> {
    items: Arc<Vec<Arc<T>>>,
}

impl<T> Clone for StreamCollection<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T> Default for StreamCollection<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> StreamCollection<T> {
    /// An empty collection.
    pub fn empty() -> Self {
        Self::from_items(Vec::new())
    }

    /// A collection over already materialized items.
    pub fn from_items(items: Vec<Arc<T>>) -> Self {
        Self {
            items: Arc::new(items),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        self.items.get(index).cloned()
    }

    pub fn first(&self) -> Option<Arc<T>> {
        self.get(0)
    }

    /// Iterates over the elements.
    pub fn iter(&self) -> impl Iterator<Item = Arc<T>> + '_ {
        self.items.iter().cloned()
    }

    /// Collects the elements.
    pub fn to_vec(&self) -> Vec<Arc<T>> {
        self.items.as_ref().clone()
    }

    /// Returns true if both handles share one snapshot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl<T: fmt::Debug> fmt::Debug for StreamCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_items() {
        let items = vec![Arc::new(1), Arc::new(2)];
        let collection = StreamCollection::from_items(items.clone());
        assert_eq!(collection.len(), 2);
        assert!(Arc::ptr_eq(&collection.get(1).unwrap(), &items[1]));
        assert!(collection.get(2).is_none());
        assert!(StreamCollection::<i32>::empty().is_empty());
    }

    #[test]
    fn test_clones_share_items() {
        let collection = StreamCollection::from_items(vec![Arc::new("a"), Arc::new("bb")]);
        let clone = collection.clone();
        assert!(clone.ptr_eq(&collection));
        assert!(Arc::ptr_eq(&clone.get(0).unwrap(), &collection.first().unwrap()));
        assert_eq!(format!("{:?}", clone), r#"["a", "bb"]"#);
        assert!(!collection.ptr_eq(&StreamCollection::from_items(collection.to_vec())));
    }
}
