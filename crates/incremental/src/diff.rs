//! Ordered snapshot diff.
//!
//! `diff_ordered` computes the edits that turn one ordered snapshot into
//! another. Edits are meant to be applied sequentially in the order returned;
//! every index refers to the list as it is when that edit is applied:
//!
//! - `Remove { index }` removes the element at `index`.
//! - `Insert { index }` inserts so the element ends up at `index`.
//! - `Move { from, to }` removes at `from`, then inserts at `to` in the
//!   shortened list.
//! - `Update { index }` replaces the element at `index`.
//!
//! Removes come first in descending index order, then inserts and moves in
//! ascending target order, then updates at final positions. Survivors on a
//! longest increasing subsequence of their new positions stay put, so the
//! number of moves is minimal. A moved element that also changed is reported
//! only as a move; the move carries the new element.

use hashbrown::HashMap;
use std::hash::Hash;

/// One positional edit. `old` and `new` point into the input snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edit {
    /// `old[old]` is removed at `index`.
    Remove { old: usize, index: usize },
    /// `new[new]` is inserted at `index`.
    Insert { new: usize, index: usize },
    /// `old[old]` moves from `from` to `to` and becomes `new[new]`.
    Move {
        old: usize,
        new: usize,
        from: usize,
        to: usize,
    },
    /// `old[old]` is replaced by `new[new]` at `index`.
    Update { old: usize, new: usize, index: usize },
}

impl Edit {
    /// Returns true for removals.
    #[inline]
    pub fn is_remove(&self) -> bool {
        matches!(self, Edit::Remove { .. })
    }

    /// Returns true for moves.
    #[inline]
    pub fn is_move(&self) -> bool {
        matches!(self, Edit::Move { .. })
    }
}

/// Computes the sequential edit script from `old` to `new`.
///
/// Elements are matched by `key`. When a key repeats, only its first
/// occurrence on each side is matched; the others are removed or inserted.
/// `changed` decides whether a matched, unmoved element needs an update.
pub fn diff_ordered<T, K, FK, FC>(old: &[T], new: &[T], key: FK, changed: FC) -> Vec<Edit>
where
    K: Hash + Eq,
    FK: Fn(&T) -> K,
    FC: Fn(&T, &T) -> bool,
{
    let mut by_key: HashMap<K, usize> = HashMap::with_capacity(old.len());
    for (i, item) in old.iter().enumerate() {
        by_key.entry(key(item)).or_insert(i);
    }

    let mut old_to_new: Vec<Option<usize>> = vec![None; old.len()];
    let mut new_to_old: Vec<Option<usize>> = vec![None; new.len()];
    for (j, item) in new.iter().enumerate() {
        if let Some(&i) = by_key.get(&key(item)) {
            if old_to_new[i].is_none() {
                old_to_new[i] = Some(j);
                new_to_old[j] = Some(i);
            }
        }
    }

    let mut edits = Vec::new();
    for i in (0..old.len()).rev() {
        if old_to_new[i].is_none() {
            edits.push(Edit::Remove { old: i, index: i });
        }
    }

    // Survivors in their current order, identified by their new position.
    let mut current: Vec<usize> = old_to_new.iter().filter_map(|j| *j).collect();
    let mut stable = vec![false; new.len()];
    for pos in longest_increasing(&current) {
        stable[current[pos]] = true;
    }

    let mut updates = Vec::new();
    for j in 0..new.len() {
        match new_to_old[j] {
            None => {
                let index = slot_after_predecessor(&current, j);
                current.insert(index, j);
                edits.push(Edit::Insert { new: j, index });
            }
            Some(i) if stable[j] => {
                if changed(&old[i], &new[j]) {
                    updates.push(Edit::Update { old: i, new: j, index: j });
                }
            }
            Some(i) => {
                let Some(from) = current.iter().position(|&x| x == j) else {
                    continue;
                };
                current.remove(from);
                let to = slot_after_predecessor(&current, j);
                current.insert(to, j);
                if from != to {
                    edits.push(Edit::Move { old: i, new: j, from, to });
                } else if changed(&old[i], &new[j]) {
                    updates.push(Edit::Update { old: i, new: j, index: j });
                }
            }
        }
    }

    edits.extend(updates);
    edits
}

/// Applies an edit script produced by [`diff_ordered`] to `old`.
///
/// Returns `None` if an edit points outside the list it is applied to.
pub fn apply_sequential<T: Clone>(old: &[T], new: &[T], edits: &[Edit]) -> Option<Vec<T>> {
    let mut list = old.to_vec();
    for edit in edits {
        match *edit {
            Edit::Remove { index, .. } => {
                if index >= list.len() {
                    return None;
                }
                list.remove(index);
            }
            Edit::Insert { new: j, index } => {
                if index > list.len() {
                    return None;
                }
                list.insert(index, new.get(j)?.clone());
            }
            Edit::Move { new: j, from, to, .. } => {
                if from >= list.len() {
                    return None;
                }
                list.remove(from);
                if to > list.len() {
                    return None;
                }
                list.insert(to, new.get(j)?.clone());
            }
            Edit::Update { new: j, index, .. } => {
                *list.get_mut(index)? = new.get(j)?.clone();
            }
        }
    }
    Some(list)
}

/// Position right after the element with new position `j - 1`.
fn slot_after_predecessor(current: &[usize], j: usize) -> usize {
    j.checked_sub(1)
        .and_then(|p| current.iter().position(|&x| x == p))
        .map_or(0, |pos| pos + 1)
}

/// Positions in `seq` forming a longest strictly increasing subsequence.
///
/// Among equally long candidates the earliest elements are preferred, so an
/// element that jumps forward is the one reported as moved.
fn longest_increasing(seq: &[usize]) -> Vec<usize> {
    let n = seq.len();
    // Scanning backwards for a decreasing run keeps the earliest candidates.
    let mut tails: Vec<usize> = Vec::new();
    let mut next: Vec<Option<usize>> = vec![None; n];

    for i in (0..n).rev() {
        let value = seq[i];
        let pos = tails.partition_point(|&t| seq[t] > value);
        if pos > 0 {
            next[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut out = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        out.push(i);
        cursor = next[i];
    }
    out
}
