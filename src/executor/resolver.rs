//! Executor lookup for qualifying calls.
//!
//! Resolution order without a method qualifier:
//! 1. Explicit executor (configurer instance or configured name)
//! 2. The only executor registered in the context
//! 3. The executor registered as [`DEFAULT_TASK_EXECUTOR_NAME`]
//! 4. The context's default factory
//!
//! A found executor is cached, and so is a failure to build the default.
//! A configured name that is not registered yet is looked up again on the
//! next call. There is no fallback to inline execution.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{debug, warn};

use super::TaskExecutor;
use crate::context::{AsyncContext, DEFAULT_TASK_EXECUTOR_NAME};
use crate::error::ExecutorResolutionError;

type Resolution = Result<Arc<dyn TaskExecutor>, ExecutorResolutionError>;

/// Where the explicit executor comes from.
#[derive(Clone)]
pub enum ExecutorRef {
    Instance(Arc<dyn TaskExecutor>),
    Named(String),
}

/// Lazily locates and caches executors.
pub struct ExecutorResolver {
    context: Arc<AsyncContext>,
    explicit: Option<ExecutorRef>,
    default: OnceLock<Resolution>,
    qualified: RwLock<HashMap<String, Arc<dyn TaskExecutor>>>,
}

impl ExecutorResolver {
    pub fn new(context: Arc<AsyncContext>, explicit: Option<ExecutorRef>) -> Self {
        Self {
            context,
            explicit,
            default: OnceLock::new(),
            qualified: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the default executor ahead of the first call.
    ///
    /// A failure is cached and reported to callers, not here.
    pub fn activate(&self) {
        if let Err(e) = self.resolve_default() {
            warn!(error = %e, "Async executor unavailable; qualifying calls will fail");
        }
    }

    /// Executor for a call, honouring a method-level qualifier.
    pub fn resolve(&self, qualifier: Option<&str>) -> Resolution {
        match qualifier {
            Some(name) => self.resolve_qualified(name),
            None => self.resolve_default(),
        }
    }

    fn resolve_qualified(&self, name: &str) -> Resolution {
        if let Some(executor) = self
            .qualified
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(executor));
        }

        // Misses are not cached; the executor may be registered later.
        let executor = self
            .context
            .executor(name)
            .ok_or_else(|| ExecutorResolutionError::UnknownExecutor(name.to_string()))?;
        self.qualified
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::clone(&executor));
        Ok(executor)
    }

    fn resolve_default(&self) -> Resolution {
        if let Some(resolution) = self.default.get() {
            return resolution.clone();
        }

        match self.lookup() {
            // The name may still be registered.
            Err(e @ ExecutorResolutionError::UnknownExecutor(_)) => Err(e),
            resolution => self.default.get_or_init(|| resolution).clone(),
        }
    }

    fn lookup(&self) -> Resolution {
        match &self.explicit {
            Some(ExecutorRef::Instance(executor)) => {
                debug!(executor = %executor.name(), "Using configured async executor");
                return Ok(Arc::clone(executor));
            }
            Some(ExecutorRef::Named(name)) => {
                return self
                    .context
                    .executor(name)
                    .ok_or_else(|| ExecutorResolutionError::UnknownExecutor(name.clone()));
            }
            None => {}
        }

        if let Some(executor) = self.context.unique_executor() {
            debug!(executor = %executor.name(), "Using unique registered executor");
            return Ok(executor);
        }

        if let Some(executor) = self.context.executor(DEFAULT_TASK_EXECUTOR_NAME) {
            debug!(executor = %executor.name(), "Using executor registered by conventional name");
            return Ok(executor);
        }

        let names = self.context.executor_names();
        if !names.is_empty() {
            warn!(
                candidates = ?names,
                "Several executors registered and none named '{}'; using default executor",
                DEFAULT_TASK_EXECUTOR_NAME
            );
        }

        self.context
            .build_default_executor()
            .inspect(|executor| debug!(executor = %executor.name(), "Built default async executor"))
            .map_err(|e| ExecutorResolutionError::DefaultUnavailable(e.to_string()))
    }
}
