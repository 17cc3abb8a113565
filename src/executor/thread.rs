use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use super::{Rejected, Task, TaskExecutor};

/// Executor that starts a fresh named OS thread for every task.
///
/// No pooling and no admission limit: `execute` never blocks beyond the
/// cost of spawning the thread.
#[derive(Debug)]
pub struct ThreadPerTaskExecutor {
    name: String,
    thread_prefix: String,
    counter: AtomicUsize,
}

impl ThreadPerTaskExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let thread_prefix = format!("{}-", name);
        Self {
            name,
            thread_prefix,
            counter: AtomicUsize::new(0),
        }
    }

    /// Override the prefix used for spawned thread names.
    pub fn with_thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_prefix = prefix.into();
        self
    }
}

impl TaskExecutor for ThreadPerTaskExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, task: Task) -> Result<(), Rejected> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let thread_name = format!("{}{}", self.thread_prefix, n);
        trace!(executor = %self.name, thread = %thread_name, "Spawning task thread");

        std::thread::Builder::new()
            .name(thread_name)
            .spawn(task)
            .map(drop)
            .map_err(|e| Rejected(format!("failed to spawn thread: {}", e)))
    }
}
