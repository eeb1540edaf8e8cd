//! Ripple Storage - Reference in-memory storage engine.
//!
//! This crate provides a small store that satisfies the engine contracts of
//! `ripple-core`:
//!
//! - `RowStore`: Row storage for one table
//! - `TableCache`: Multi-table cache management
//! - `Journal`: Change tracking for transactions
//! - `Transaction`: Write transactions with rollback support
//! - `QuerySpec`: Table, filter and native sort descriptors
//! - `Context`: Inline and worker-thread execution contexts
//! - `StoreLiveQuery`: A `LiveQuery` refreshed after every commit
//! - `Store`: Ties it together and erases all data on request
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{LiveQuery, Row, SortDescriptor};
//! use ripple_storage::{QuerySpec, Store, StoreConfig};
//!
//! let store = Store::new(StoreConfig::default()).unwrap();
//! store.create_table("channels").unwrap();
//! store
//!     .write(|tx| tx.insert("channels", Row::new(1).with("name", "general")))
//!     .unwrap();
//!
//! let query = store
//!     .live_query(
//!         &store.view_context(),
//!         QuerySpec::new("channels").sort_by(SortDescriptor::asc("name")),
//!     )
//!     .unwrap();
//! query.perform_fetch().unwrap();
//! assert_eq!(query.fetched().len(), 1);
//! ```

pub mod cache;
pub mod context;
pub mod journal;
pub mod live;
pub mod query;
pub mod registry;
pub mod row_store;
pub mod store;
pub mod transaction;

pub use cache::TableCache;
pub use context::Context;
pub use journal::{Journal, JournalEntry, TableDiff};
pub use live::StoreLiveQuery;
pub use query::{Filter, QuerySpec};
pub use registry::{QueryId, QueryRegistry};
pub use row_store::RowStore;
pub use store::{Store, StoreConfig};
pub use transaction::{Transaction, TransactionId, TransactionState};
