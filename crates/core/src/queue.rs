//! Serial work queue backed by a dedicated thread.
//!
//! Jobs run one at a time in submission order. Dropping the queue closes the
//! channel; the worker drains what is already queued and exits.

use crate::engine::Job;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, trace};

/// A FIFO queue with its own worker thread.
pub struct SerialQueue {
    label: String,
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

struct ReleaseOnDrop(Option<mpsc::Sender<()>>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

impl SerialQueue {
    /// Spawns the worker thread.
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name(label.clone())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
            })
            .map_err(|e| Error::invalid_operation(format!("cannot spawn queue `{label}`: {e}")))?;
        let thread_id = worker.thread().id();
        debug!(queue = %label, "serial queue started");

        Ok(Self {
            label,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            thread_id,
        })
    }

    /// Queue name.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns true when called from the worker thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Enqueues a job.
    pub fn dispatch(&self, job: Job) -> Result<()> {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) => tx
                .send(job)
                .map_err(|_| Error::disconnected(format!("queue `{}`", self.label))),
            None => Err(Error::disconnected(format!("queue `{}`", self.label))),
        }
    }

    /// Runs `work` on the calling thread while the worker is parked at this
    /// point of the queue. Everything enqueued before has finished when `work`
    /// starts, and nothing enqueued after starts until it returns.
    pub fn dispatch_and_wait(&self, work: &mut dyn FnMut()) -> Result<()> {
        if self.is_current() {
            work();
            return Ok(());
        }

        let (arrived_tx, arrived_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        self.dispatch(Box::new(move || {
            let _ = arrived_tx.send(());
            let _ = release_rx.recv();
        }))?;

        let release = ReleaseOnDrop(Some(release_tx));
        arrived_rx
            .recv()
            .map_err(|_| Error::disconnected(format!("queue `{}`", self.label)))?;
        trace!(queue = %self.label, "rendezvous reached");
        work();
        drop(release);
        Ok(())
    }

    /// Waits until every job enqueued so far has run.
    pub fn flush(&self) -> Result<()> {
        self.dispatch_and_wait(&mut || {})
    }

    /// Stops accepting jobs. Already queued jobs still run.
    pub fn close(&self) {
        self.sender.lock().take();
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        self.close();
        let worker = self.worker.lock().take();
        if let Some(handle) = worker {
            // A job holding the last reference drops the queue on its own
            // worker thread; joining there would never return.
            if !self.is_current() {
                let _ = handle.join();
            }
        }
        debug!(queue = %self.label, "serial queue stopped");
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue").field("label", &self.label).finish()
    }
}
