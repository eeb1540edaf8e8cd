//! Ripple Incremental - Raw change events and ordered snapshot diffing.
//!
//! This crate holds the pieces shared by the storage engine and the
//! observers that turn two ordered snapshots into a change stream.
//!
//! # Core Concepts
//!
//! - `RecordChange<R>`: One raw per-record event (insert, delete, update, move)
//! - `ChangeBatch<R>`: All raw events of one engine transaction
//! - `Edit`: A positional edit produced by `diff_ordered`
//!
//! Edits and raw events share one index convention: they are applied
//! sequentially, and each one's indices refer to the list as it is at that
//! point.
//!
//! # Example
//!
//! ```rust
//! use ripple_incremental::{apply_sequential, diff_ordered};
//!
//! let old = vec!["a", "b", "c"];
//! let new = vec!["c", "a", "d"];
//! let edits = diff_ordered(&old, &new, |s| *s, |_, _| false);
//!
//! assert_eq!(apply_sequential(&old, &new, &edits), Some(new));
//! ```

pub mod delta;
pub mod diff;

pub use delta::{ChangeBatch, ChangeBatchExt, RecordChange};
pub use diff::{apply_sequential, diff_ordered, Edit};
pub use ripple_core::ChangeKind;
