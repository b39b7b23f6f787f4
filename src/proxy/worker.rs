//! Dedicated thread that runs PAC script attempts.
//!
//! Script engines are synchronous and single-threaded per instance, so each
//! resolver owns one OS thread with a FIFO task queue. Tasks never run
//! concurrently with each other.

use crate::base::neterror::NetError;
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc;

type Task = Box<dyn FnOnce() + Send + 'static>;

enum WorkerMessage {
    Task(Task),
    Shutdown,
}

/// Cloneable handle for posting tasks to a [`WorkerThread`].
#[derive(Clone)]
pub struct WorkerHandle {
    sender: mpsc::UnboundedSender<WorkerMessage>,
    thread_id: ThreadId,
}

impl WorkerHandle {
    /// Queues `task` behind everything already posted.
    pub fn post_task(&self, task: impl FnOnce() + Send + 'static) -> Result<(), NetError> {
        self.sender.send(WorkerMessage::Task(Box::new(task))).map_err(|_| {
            tracing::warn!("worker thread is gone, dropping task");
            NetError::Unexpected
        })
    }

    /// Whether the caller is running on the worker thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle").field("thread_id", &self.thread_id).finish()
    }
}

/// Owns the worker thread; dropping it stops and joins the thread.
///
/// Tasks queued behind the stop request are discarded.
pub struct WorkerThread {
    handle: WorkerHandle,
    join: Option<JoinHandle<()>>,
    name: String,
}

impl WorkerThread {
    pub fn start(name: &str) -> Result<Self, NetError> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<WorkerMessage>();
        let thread_name = name.to_string();

        let join = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                tracing::debug!(thread = %thread_name, "worker thread started");
                while let Some(message) = receiver.blocking_recv() {
                    match message {
                        WorkerMessage::Task(task) => task(),
                        WorkerMessage::Shutdown => break,
                    }
                }
                tracing::debug!(thread = %thread_name, "worker thread exiting");
            })
            .map_err(|e| {
                tracing::error!(error = %e, "failed to spawn worker thread");
                NetError::Unexpected
            })?;

        let handle = WorkerHandle { sender, thread_id: join.thread().id() };
        Ok(Self { handle, join: Some(join), name: name.to_string() })
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        let _ = self.handle.sender.send(WorkerMessage::Shutdown);
        let Some(join) = self.join.take() else {
            return;
        };
        // Joining from the worker itself would deadlock; let it wind down.
        if self.handle.is_current() {
            return;
        }
        if join.join().is_err() {
            tracing::error!(thread = %self.name, "worker thread panicked");
        }
    }
}

impl std::fmt::Debug for WorkerThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerThread").field("name", &self.name).finish()
    }
}
