//! Tokio-backed executor.
//!
//! Method bodies are synchronous, so tasks go to the runtime's blocking
//! pool rather than its async workers.

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

use super::{Rejected, Task, TaskExecutor};

/// Upper bound on blocking threads for an owned runtime.
const DEFAULT_MAX_BLOCKING_THREADS: usize = 64;

/// Executor that runs tasks on a Tokio runtime's blocking pool.
///
/// Either borrows an existing runtime via its [`Handle`] or owns one. An
/// owned runtime is shut down in the background on drop so dropping the
/// executor is safe from inside async code.
pub struct TokioExecutor {
    name: String,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl TokioExecutor {
    /// Build an executor owning a dedicated multi-threaded runtime.
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        Self::with_max_threads(name, DEFAULT_MAX_BLOCKING_THREADS)
    }

    /// Build an owned runtime allowing at most `max_threads` concurrent bodies.
    pub fn with_max_threads(name: impl Into<String>, max_threads: usize) -> std::io::Result<Self> {
        let name = name.into();
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_threads.max(1))
            .thread_name(format!("{}-worker", name))
            .enable_all()
            .build()?;

        debug!(executor = %name, max_threads, "Tokio executor runtime started");

        Ok(Self {
            name,
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Run tasks on an existing runtime.
    pub fn from_handle(name: impl Into<String>, handle: Handle) -> Self {
        Self {
            name: name.into(),
            handle,
            runtime: None,
        }
    }

    /// Run tasks on the runtime the caller is currently inside.
    pub fn current(name: impl Into<String>) -> Option<Self> {
        Handle::try_current()
            .ok()
            .map(|handle| Self::from_handle(name, handle))
    }
}

impl TaskExecutor for TokioExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, task: Task) -> Result<(), Rejected> {
        // The join handle is detached; results travel through the task itself.
        drop(self.handle.spawn_blocking(task));
        Ok(())
    }
}

impl Drop for TokioExecutor {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
