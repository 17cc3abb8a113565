//! Handling of failures nobody else can observe.
//!
//! Void- and value-kind dispatches give the caller no channel for the
//! eventual outcome, so body failures land here exactly once. Future-kind
//! dispatches never reach a handler; the handle carries the error.

use std::sync::{Arc, OnceLock};

use tracing::{error, warn};

use crate::component::Arguments;
use crate::context::AsyncContext;
use crate::error::{ConfigurationError, InvocationError};
use crate::interceptor::QualifyingMethod;

/// Strategy for failures of fire-and-forget invocations.
///
/// Implementations must not panic; a failing handler is a defect of the
/// handler and is not retried.
pub trait AsyncErrorHandler: Send + Sync {
    fn handle(&self, method: &QualifyingMethod, args: &Arguments, error: &InvocationError);
}

impl<F> AsyncErrorHandler for F
where
    F: Fn(&QualifyingMethod, &Arguments, &InvocationError) + Send + Sync,
{
    fn handle(&self, method: &QualifyingMethod, args: &Arguments, error: &InvocationError) {
        self(method, args, error)
    }
}

/// Default handler: records the failure through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorHandler;

impl AsyncErrorHandler for LoggingErrorHandler {
    fn handle(&self, method: &QualifyingMethod, args: &Arguments, error: &InvocationError) {
        error!(
            component = %method.component(),
            method = %method.name(),
            args = %args,
            error = %error,
            "Unexpected error occurred invoking async method"
        );
    }
}

/// Where the error handler comes from.
#[derive(Clone)]
pub enum ErrorHandlerRef {
    Instance(Arc<dyn AsyncErrorHandler>),
    Named(String),
}

/// Resolves the error handler and caches it once found.
///
/// A configured name that is missing is looked up again on every use, so a
/// handler registered late is still picked up.
pub struct ErrorHandlerResolver {
    context: Arc<AsyncContext>,
    explicit: Option<ErrorHandlerRef>,
    resolved: OnceLock<Arc<dyn AsyncErrorHandler>>,
}

impl ErrorHandlerResolver {
    pub fn new(context: Arc<AsyncContext>, explicit: Option<ErrorHandlerRef>) -> Self {
        Self {
            context,
            explicit,
            resolved: OnceLock::new(),
        }
    }

    /// Resolve now, reporting a configured name that does not exist.
    pub fn activate(&self) -> Result<(), ConfigurationError> {
        self.resolve().map(drop)
    }

    /// The handler to route failures to.
    ///
    /// Falls back to [`LoggingErrorHandler`] when the configured name was
    /// never registered.
    pub fn handler(&self) -> Arc<dyn AsyncErrorHandler> {
        match self.resolve() {
            Ok(handler) => handler,
            Err(e) => {
                warn!(error = %e, "Falling back to logging error handler");
                Arc::new(LoggingErrorHandler)
            }
        }
    }

    fn resolve(&self) -> Result<Arc<dyn AsyncErrorHandler>, ConfigurationError> {
        if let Some(handler) = self.resolved.get() {
            return Ok(Arc::clone(handler));
        }

        let handler: Arc<dyn AsyncErrorHandler> = match &self.explicit {
            Some(ErrorHandlerRef::Instance(handler)) => Arc::clone(handler),
            Some(ErrorHandlerRef::Named(name)) => self
                .context
                .error_handler(name)
                .ok_or_else(|| ConfigurationError::UnknownErrorHandler(name.clone()))?,
            None => Arc::new(LoggingErrorHandler),
        };
        Ok(Arc::clone(self.resolved.get_or_init(|| handler)))
    }
}
