//! Change types delivered to subscribers.
//!
//! A `ListChange` describes one item's transition within an ordered
//! collection. A batch is applied sequentially in declaration order and each
//! change's indices refer to the list as it is when that change is applied:
//!
//! - `Remove { index }` removes the element at `index`.
//! - `Insert { index }` inserts so the item ends up at `index`.
//! - `Move { from, to }` removes at `from`, then inserts at `to` in the
//!   shortened list.
//! - `Update { index }` replaces the element at `index`.
//!
//! An `EntityChange` is the single-record counterpart used by entity
//! observers.

use std::fmt;

/// One item's transition within an ordered collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListChange<I> {
    /// `item` was inserted at `index`.
    Insert { item: I, index: usize },
    /// `item` was removed from `index`.
    Remove { item: I, index: usize },
    /// The item at `index` was replaced by `item`.
    Update { item: I, index: usize },
    /// The item moved from `from` to `to`; `item` is its current value.
    Move { item: I, from: usize, to: usize },
}

impl<I> ListChange<I> {
    /// Returns the item carried by this change.
    #[inline]
    pub fn item(&self) -> &I {
        match self {
            ListChange::Insert { item, .. }
            | ListChange::Remove { item, .. }
            | ListChange::Update { item, .. }
            | ListChange::Move { item, .. } => item,
        }
    }

    /// Consumes the change and returns its item.
    #[inline]
    pub fn into_item(self) -> I {
        match self {
            ListChange::Insert { item, .. }
            | ListChange::Remove { item, .. }
            | ListChange::Update { item, .. }
            | ListChange::Move { item, .. } => item,
        }
    }

    /// Maps the carried item, keeping the indices.
    pub fn map<U, F>(self, f: F) -> ListChange<U>
    where
        F: FnOnce(I) -> U,
    {
        match self {
            ListChange::Insert { item, index } => ListChange::Insert { item: f(item), index },
            ListChange::Remove { item, index } => ListChange::Remove { item: f(item), index },
            ListChange::Update { item, index } => ListChange::Update { item: f(item), index },
            ListChange::Move { item, from, to } => ListChange::Move { item: f(item), from, to },
        }
    }

    /// Projects a field out of the item, keeping the kind and indices.
    pub fn field_change<U, F>(&self, projection: F) -> ListChange<U>
    where
        F: FnOnce(&I) -> U,
    {
        match self {
            ListChange::Insert { item, index } => ListChange::Insert { item: projection(item), index: *index },
            ListChange::Remove { item, index } => ListChange::Remove { item: projection(item), index: *index },
            ListChange::Update { item, index } => ListChange::Update { item: projection(item), index: *index },
            ListChange::Move { item, from, to } => ListChange::Move {
                item: projection(item),
                from: *from,
                to: *to,
            },
        }
    }

    #[inline]
    pub fn is_insert(&self) -> bool {
        matches!(self, ListChange::Insert { .. })
    }

    #[inline]
    pub fn is_remove(&self) -> bool {
        matches!(self, ListChange::Remove { .. })
    }

    #[inline]
    pub fn is_update(&self) -> bool {
        matches!(self, ListChange::Update { .. })
    }

    #[inline]
    pub fn is_move(&self) -> bool {
        matches!(self, ListChange::Move { .. })
    }
}

impl<I: fmt::Debug> fmt::Display for ListChange<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListChange::Insert { item, index } => write!(f, "insert at {index}: {item:?}"),
            ListChange::Remove { item, index } => write!(f, "remove at {index}: {item:?}"),
            ListChange::Update { item, index } => write!(f, "update at {index}: {item:?}"),
            ListChange::Move { item, from, to } => write!(f, "move from {from} to {to}: {item:?}"),
        }
    }
}

/// Applies `changes` sequentially to `items`.
///
/// Returns `None` if any index is out of range for the list at the moment the
/// change is applied.
pub fn apply_changes<I: Clone>(items: &[I], changes: &[ListChange<I>]) -> Option<Vec<I>> {
    let mut out = items.to_vec();
    for change in changes {
        match change {
            ListChange::Remove { index, .. } => {
                if *index >= out.len() {
                    return None;
                }
                out.remove(*index);
            }
            ListChange::Insert { item, index } => {
                if *index > out.len() {
                    return None;
                }
                out.insert(*index, item.clone());
            }
            ListChange::Move { item, from, to } => {
                if *from >= out.len() {
                    return None;
                }
                out.remove(*from);
                if *to > out.len() {
                    return None;
                }
                out.insert(*to, item.clone());
            }
            ListChange::Update { item, index } => {
                *out.get_mut(*index)? = item.clone();
            }
        }
    }
    Some(out)
}

/// A change to a query known to match at most one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityChange<I> {
    /// The record started matching.
    Create(I),
    /// The record changed.
    Update(I),
    /// The record stopped matching.
    Remove(I),
}

impl<I> EntityChange<I> {
    /// Returns the carried item.
    #[inline]
    pub fn item(&self) -> &I {
        match self {
            EntityChange::Create(item) | EntityChange::Update(item) | EntityChange::Remove(item) => item,
        }
    }

    /// Consumes the change and returns its item.
    #[inline]
    pub fn into_item(self) -> I {
        match self {
            EntityChange::Create(item) | EntityChange::Update(item) | EntityChange::Remove(item) => item,
        }
    }

    /// Maps the carried item, keeping the kind.
    pub fn map<U, F>(self, f: F) -> EntityChange<U>
    where
        F: FnOnce(I) -> U,
    {
        match self {
            EntityChange::Create(item) => EntityChange::Create(f(item)),
            EntityChange::Update(item) => EntityChange::Update(f(item)),
            EntityChange::Remove(item) => EntityChange::Remove(f(item)),
        }
    }

    /// Projects a field out of the item.
    pub fn field_change<U, F>(&self, projection: F) -> EntityChange<U>
    where
        F: FnOnce(&I) -> U,
    {
        match self {
            EntityChange::Create(item) => EntityChange::Create(projection(item)),
            EntityChange::Update(item) => EntityChange::Update(projection(item)),
            EntityChange::Remove(item) => EntityChange::Remove(projection(item)),
        }
    }

    #[inline]
    pub fn is_remove(&self) -> bool {
        matches!(self, EntityChange::Remove(_))
    }
}

impl<I> From<ListChange<I>> for EntityChange<I> {
    fn from(change: ListChange<I>) -> Self {
        match change {
            ListChange::Insert { item, .. } => EntityChange::Create(item),
            ListChange::Update { item, .. } | ListChange::Move { item, .. } => EntityChange::Update(item),
            ListChange::Remove { item, .. } => EntityChange::Remove(item),
        }
    }
}
