//! Workers that run dispatched calls.
//!
//! This module contains:
//! - `TaskExecutor` trait: hand a task to a worker
//! - `ExecutorResolver`: locates the executor for a qualifying call
//! - Implementations: Tokio blocking pool, thread per task, serial FIFO

use std::fmt;

mod resolver;
mod runtime;
mod serial;
mod thread;

pub use resolver::{ExecutorRef, ExecutorResolver};
pub use runtime::TokioExecutor;
pub use serial::SerialExecutor;
pub use thread::ThreadPerTaskExecutor;


/// Unit of work handed to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// An executor refused to accept a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Rejected(pub String);

/// Interface for the worker that runs intercepted method bodies.
///
/// `execute` must not wait for the task to finish. It may block briefly for
/// admission when the implementation bounds its queue; implementations
/// document whether they do.
pub trait TaskExecutor: Send + Sync {
    /// Name used in logs and rejection errors.
    fn name(&self) -> &str;

    /// Submit `task` for execution.
    fn execute(&self, task: Task) -> Result<(), Rejected>;
}

impl fmt::Debug for dyn TaskExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("name", &self.name())
            .finish()
    }
}
