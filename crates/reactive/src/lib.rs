//! Ripple Reactive - Change observation over live queries.
//!
//! This crate turns the raw per-record notifications of a storage engine's
//! live queries into ordered, minimal change batches for subscribers.
//!
//! # Core Concepts
//!
//! - `ChangeAggregator`: Buffers one engine transaction's raw events and
//!   converts them into a `ListChange` batch
//! - `ItemReuseMemoizer`: Keeps item identity for records that did not change
//! - `RuntimeSortMerger`: Applies sort criteria the engine cannot evaluate
//! - `ListObserver` / `BackgroundListObserver`: Ordered collections with
//!   change batches, delivered inline or on a dedicated queue
//! - `EntityObserver` / `BackgroundEntityObserver`: Single-record views with
//!   deduplicating field listeners
//! - `BulkRemovalBridge`: Reports a store-wide erase as ordinary removals
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{ConversionError, Row, SortDescriptor, Value};
//! use ripple_reactive::{EntityChange, EntityObserver};
//! use ripple_storage::{QuerySpec, Store, StoreConfig};
//! use std::sync::Arc;
//!
//! let store = Store::new(StoreConfig::default()).unwrap();
//! store.create_table("users").unwrap();
//!
//! let query = store
//!     .live_query(
//!         &store.view_context(),
//!         QuerySpec::new("users")
//!             .filter_eq("handle", "ada")
//!             .sort_by(SortDescriptor::asc("handle")),
//!     )
//!     .unwrap();
//! let observer = EntityObserver::new(query, |row: &Arc<Row>| {
//!     row.get("name")
//!         .and_then(Value::as_str)
//!         .map(str::to_owned)
//!         .ok_or_else(|| ConversionError::missing_field(row.id(), "name"))
//! });
//! observer.on_change(|change: &EntityChange<Arc<String>>| println!("{change:?}"));
//! observer.start_observing().unwrap();
//!
//! store
//!     .write(|tx| tx.insert("users", Row::new(1).with("handle", "ada").with("name", "Ada")))
//!     .unwrap();
//! assert_eq!(observer.item().as_deref().map(String::as_str), Some("Ada"));
//! ```

pub mod aggregator;
pub mod background;
pub mod change;
pub mod collection;
pub mod config;
pub mod entity;
pub mod list;
pub mod memoize;
pub mod observer;
pub mod runtime_sort;
pub mod sort;
pub mod subscription;
pub mod teardown;
mod view;

pub use aggregator::{AggregatedBatch, ChangeAggregator, ConvertFn};
pub use background::BackgroundListObserver;
pub use change::{apply_changes, EntityChange, ListChange};
pub use collection::StreamCollection;
pub use config::ObserverConfig;
pub use entity::{BackgroundEntityObserver, EntityObserver};
pub use list::ListObserver;
pub use memoize::{Entry, ItemReuseMemoizer, ReuseKey};
pub use observer::ObserverState;
pub use runtime_sort::RuntimeSortMerger;
pub use sort::{compose, matches_native_order, native_descriptors, requires_runtime_sorting, Comparator, SortField, SortSpec, SortValue};
pub use subscription::{Callback, Subscription, SubscriptionId, SubscriptionManager};
pub use teardown::{BulkRemovalBridge, BulkRemovalTarget};

// Re-export commonly used types from dependencies
pub use ripple_core::{ChangeKind, ConversionError, LiveQuery, RecordId};
