//! Named infrastructure available to async dispatch.
//!
//! The context is the lookup space the executor and error-handler resolvers
//! consult. It may be populated before or after the registrar is built;
//! resolution happens at activation or on first call, never at construction.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ConfigurationError;
use crate::executor::{TaskExecutor, TokioExecutor};
use crate::handler::AsyncErrorHandler;

/// Conventional name of the executor picked when several are registered.
pub const DEFAULT_TASK_EXECUTOR_NAME: &str = "taskExecutor";

/// Builds the fallback executor when nothing is registered.
pub type DefaultExecutorFactory =
    Arc<dyn Fn() -> std::io::Result<Arc<dyn TaskExecutor>> + Send + Sync>;

/// Application-supplied executor and error handler.
///
/// At most one configurer may be registered in a context.
pub trait AsyncConfigurer: Send + Sync {
    fn async_executor(&self) -> Option<Arc<dyn TaskExecutor>> {
        None
    }

    fn async_error_handler(&self) -> Option<Arc<dyn AsyncErrorHandler>> {
        None
    }
}

/// Registry of named executors, error handlers and configurers.
pub struct AsyncContext {
    executors: RwLock<BTreeMap<String, Arc<dyn TaskExecutor>>>,
    error_handlers: RwLock<HashMap<String, Arc<dyn AsyncErrorHandler>>>,
    configurers: RwLock<Vec<Arc<dyn AsyncConfigurer>>>,
    default_executor: DefaultExecutorFactory,
}

impl Default for AsyncContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncContext {
    /// Create an empty context whose fallback is an owned Tokio executor.
    pub fn new() -> Self {
        Self {
            executors: RwLock::new(BTreeMap::new()),
            error_handlers: RwLock::new(HashMap::new()),
            configurers: RwLock::new(Vec::new()),
            default_executor: Arc::new(|| {
                TokioExecutor::new("offload-default").map(|e| Arc::new(e) as Arc<dyn TaskExecutor>)
            }),
        }
    }

    /// Replace the factory used when no executor can be looked up.
    pub fn with_default_executor<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> std::io::Result<Arc<dyn TaskExecutor>> + Send + Sync + 'static,
    {
        self.default_executor = Arc::new(factory);
        self
    }

    pub fn register_executor(&self, name: impl Into<String>, executor: Arc<dyn TaskExecutor>) {
        self.executors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), executor);
    }

    pub fn executor(&self, name: &str) -> Option<Arc<dyn TaskExecutor>> {
        self.executors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// The only registered executor, if exactly one exists.
    pub fn unique_executor(&self) -> Option<Arc<dyn TaskExecutor>> {
        let executors = self.executors.read().unwrap_or_else(PoisonError::into_inner);
        if executors.len() == 1 {
            executors.values().next().cloned()
        } else {
            None
        }
    }

    pub fn executor_names(&self) -> Vec<String> {
        self.executors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn register_error_handler(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn AsyncErrorHandler>,
    ) {
        self.error_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), handler);
    }

    pub fn error_handler(&self, name: &str) -> Option<Arc<dyn AsyncErrorHandler>> {
        self.error_handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn add_configurer(&self, configurer: Arc<dyn AsyncConfigurer>) {
        self.configurers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(configurer);
    }

    /// The registered configurer, or an error if more than one exists.
    pub fn configurer(&self) -> Result<Option<Arc<dyn AsyncConfigurer>>, ConfigurationError> {
        let configurers = self.configurers.read().unwrap_or_else(PoisonError::into_inner);
        match configurers.len() {
            0 => Ok(None),
            1 => Ok(configurers.first().cloned()),
            n => Err(ConfigurationError::MultipleConfigurers(n)),
        }
    }

    pub(crate) fn build_default_executor(&self) -> std::io::Result<Arc<dyn TaskExecutor>> {
        (self.default_executor)()
    }
}

impl fmt::Debug for AsyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers: Vec<String> = self
            .error_handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("AsyncContext")
            .field("executors", &self.executor_names())
            .field("error_handlers", &handlers)
            .finish_non_exhaustive()
    }
}
