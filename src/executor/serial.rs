use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, error};

use super::{Rejected, Task, TaskExecutor};

/// Executor running tasks one at a time, in submission order, on a single
/// named worker thread.
///
/// The queue is bounded: once `capacity` tasks are waiting, `execute` blocks
/// the submitting thread until the worker frees a slot. After
/// [`shutdown`](Self::shutdown) new tasks are rejected while queued ones
/// still run.
pub struct SerialExecutor {
    name: String,
    sender: Mutex<Option<SyncSender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SerialExecutor {
    pub fn new(name: impl Into<String>, capacity: usize) -> std::io::Result<Self> {
        let name = name.into();
        let (sender, receiver) = sync_channel::<Task>(capacity.max(1));

        let worker_name = name.clone();
        let worker = std::thread::Builder::new()
            .name(format!("{}-serial", name))
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!(executor = %worker_name, "Serial task panicked");
                    }
                }
                debug!(executor = %worker_name, "Serial executor drained");
            })?;

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stop accepting tasks. Already queued tasks still run.
    pub fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Shut down and wait for the queue to drain.
    ///
    /// Must not be called from a task running on this executor.
    pub fn join(&self) {
        self.shutdown();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!(executor = %self.name, "Serial worker thread panicked");
            }
        }
    }
}

impl TaskExecutor for SerialExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, task: Task) -> Result<(), Rejected> {
        // Clone out so a full queue blocks without holding the lock.
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            return Err(Rejected("executor is shut down".to_string()));
        };
        sender
            .send(task)
            .map_err(|_| Rejected("worker thread has stopped".to_string()))
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
