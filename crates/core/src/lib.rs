//! Ripple Core - Shared types and storage-engine contracts.
//!
//! This crate provides the foundation every other Ripple crate builds on:
//!
//! - `Value`: Field values and the shared null-last comparison
//! - `RawRecord`: Contract for a persisted row handle
//! - `Row`: The concrete record kept by the reference store
//! - `engine`: Live query, results delegate and execution context contracts
//! - `signals`: Store-scoped bulk teardown signals
//! - `queue`: Serial work queue backed by a thread
//! - `Error`: Error types for all Ripple operations
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{compare_values, RawRecord, Row, Value};
//! use core::cmp::Ordering;
//!
//! let row = Row::new(1).with("name", "general").with("created_at", Value::DateTime(10));
//! assert_eq!(row.id(), 1);
//! assert_eq!(row.field("name").and_then(|v| v.as_str()), Some("general"));
//!
//! // Absent values sort last in either direction.
//! let absent = compare_values(None, row.field("created_at"), false);
//! assert_eq!(absent, Ordering::Greater);
//! ```

mod error;
mod record;
mod row;
mod value;

pub mod engine;
pub mod queue;
pub mod signals;

pub use engine::{ChangeKind, ExecutionContext, Job, LiveQuery, ResultsDelegate, SortDescriptor};
pub use error::{ConversionError, Error, Result};
pub use queue::SerialQueue;
pub use record::{RawRecord, RecordId};
pub use row::{next_row_id, set_next_row_id_if_greater, Row};
pub use signals::{SignalToken, StoreSignal, StoreSignals};
pub use value::{compare_values, Value};
