//! Storage-engine collaborator contracts.
//!
//! The observation core never talks to a concrete store. It registers a
//! [`LiveQuery`], receives raw per-record events through a
//! [`ResultsDelegate`], and runs work on the query's [`ExecutionContext`].

use crate::error::Result;
use crate::record::RawRecord;
use crate::signals::StoreSignals;
use std::fmt;
use std::sync::{Arc, Weak};

/// Kind of a raw per-record change reported by a live query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The record started matching the query.
    Insert,
    /// The record stopped matching the query or was deleted.
    Delete,
    /// The record changed in place.
    Update,
    /// The record changed position.
    Move,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Delete => "delete",
            ChangeKind::Update => "update",
            ChangeKind::Move => "move",
        };
        f.write_str(name)
    }
}

/// A native sort criterion the storage engine can evaluate itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortDescriptor {
    /// Field name on the raw record.
    pub field: String,
    /// Sort direction.
    pub ascending: bool,
}

impl SortDescriptor {
    /// Creates a descriptor.
    pub fn new(field: impl Into<String>, ascending: bool) -> Self {
        Self {
            field: field.into(),
            ascending,
        }
    }

    /// Ascending descriptor.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, true)
    }

    /// Descending descriptor.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, false)
    }
}

/// Unit of work scheduled on an execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A serialized execution context of the storage engine.
///
/// All live-query callbacks of one context run serialized on it.
pub trait ExecutionContext: Send + Sync + 'static {
    /// Name used in diagnostics.
    fn label(&self) -> &str;

    /// Schedules `job` on the context. Immediate contexts run it inline.
    fn perform(&self, job: Job);

    /// Runs `work` serialized with the context's other work and returns once
    /// it has finished. Runs inline when already on the context.
    fn perform_and_wait(&self, work: &mut dyn FnMut());

    /// Store-scoped bulk teardown signals for this context.
    fn signals(&self) -> &StoreSignals;
}

/// Receives raw change events from a live query.
///
/// One engine transaction produces `will_change`, zero or more
/// `did_change_record`, then `did_change_content`, all on the query's context.
pub trait ResultsDelegate<R>: Send + Sync {
    /// A batch is about to be reported.
    fn will_change(&self);

    /// One record changed. `index` is the position before the change,
    /// `new_index` the position after it; which of the two are present depends
    /// on `kind`.
    fn did_change_record(
        &self,
        record: &R,
        index: Option<usize>,
        kind: ChangeKind,
        new_index: Option<usize>,
    );

    /// The batch is complete.
    fn did_change_content(&self);
}

/// A registered declarative query with live change tracking.
pub trait LiveQuery: Send + Sync + 'static {
    /// Raw record handle type.
    type Record: RawRecord + Clone;

    /// Short description for diagnostics.
    fn describe(&self) -> String;

    /// Executes the query and replaces the fetched record set.
    fn perform_fetch(&self) -> Result<()>;

    /// The currently fetched records in native sort order.
    fn fetched(&self) -> Vec<Self::Record>;

    /// The native sort descriptors the engine orders records by.
    fn sort_descriptors(&self) -> Vec<SortDescriptor>;

    /// Installs or removes the delegate. The query holds it weakly.
    fn set_delegate(&self, delegate: Option<Weak<dyn ResultsDelegate<Self::Record>>>);

    /// The context the query delivers its events on.
    fn context(&self) -> Arc<dyn ExecutionContext>;
}
