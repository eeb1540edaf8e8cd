//! Serialized execution contexts.
//!
//! A store has two contexts. The view context runs work inline on the calling
//! thread under a reentrant lock. The background context owns a worker thread
//! and runs work there in submission order.

use ripple_core::{ExecutionContext, Job, Result, SerialQueue, StoreSignals};
use parking_lot::ReentrantMutex;
use tracing::{error, warn};

enum Executor {
    Immediate(ReentrantMutex<()>),
    Queue(SerialQueue),
}

/// A serialized execution context with its own teardown signal hub.
pub struct Context {
    label: String,
    executor: Executor,
    signals: StoreSignals,
}

impl Context {
    /// Creates an inline context.
    pub fn immediate(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            executor: Executor::Immediate(ReentrantMutex::new(())),
            signals: StoreSignals::new(),
        }
    }

    /// Creates a context backed by a worker thread.
    pub fn queue(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        Ok(Self {
            executor: Executor::Queue(SerialQueue::new(label.clone())?),
            label,
            signals: StoreSignals::new(),
        })
    }

    /// Returns true for the inline context.
    pub fn is_immediate(&self) -> bool {
        matches!(self.executor, Executor::Immediate(_))
    }

    /// Waits until all work submitted so far has run.
    pub fn flush(&self) {
        self.perform_and_wait(&mut || {});
    }
}

impl ExecutionContext for Context {
    fn label(&self) -> &str {
        &self.label
    }

    fn perform(&self, job: Job) {
        match &self.executor {
            Executor::Immediate(lock) => {
                let _guard = lock.lock();
                job();
            }
            Executor::Queue(queue) => {
                if let Err(e) = queue.dispatch(job) {
                    warn!(context = %self.label, error = %e, "dropping job");
                }
            }
        }
    }

    fn perform_and_wait(&self, work: &mut dyn FnMut()) {
        match &self.executor {
            Executor::Immediate(lock) => {
                let _guard = lock.lock();
                work();
            }
            Executor::Queue(queue) => {
                if let Err(e) = queue.dispatch_and_wait(work) {
                    error!(context = %self.label, error = %e, "context unavailable");
                }
            }
        }
    }

    fn signals(&self) -> &StoreSignals {
        &self.signals
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("label", &self.label)
            .field("immediate", &self.is_immediate())
            .finish()
    }
}
