//! Error taxonomy for async dispatch.
//!
//! - [`ConfigurationError`]: assembly-time, aborts registration entirely
//! - [`WrappingError`]: assembly-time, fatal for one component
//! - [`ExecutorResolutionError`]: first-call-time, returned to the caller
//! - [`InvocationError`]: everything a call can produce, including
//!   method-body failures carried by [`MethodError`]

use std::fmt;

/// Result type for component invocations.
pub type Result<T> = std::result::Result<T, InvocationError>;

/// Enabling metadata is missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Async enablement metadata was not supplied")]
    MissingMetadata,

    #[error("Marker type must be a non-empty identifier")]
    InvalidMarker,

    #[error("Only one AsyncConfigurer may exist, found {0}")]
    MultipleConfigurers(usize),

    #[error("No error handler registered under '{0}'")]
    UnknownErrorHandler(String),

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// A component could not be wrapped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WrappingError {
    #[error("Component '{component}' is sealed and cannot be proxied by target class")]
    Sealed { component: String },

    #[error("Component '{component}' is already wrapped for async dispatch")]
    AlreadyWrapped { component: String },

    #[error("Component '{0}' is already registered")]
    DuplicateComponent(String),
}

/// No executor could be found or built for a qualifying call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorResolutionError {
    #[error("No executor registered under '{0}'")]
    UnknownExecutor(String),

    #[error("Default executor could not be constructed: {0}")]
    DefaultUnavailable(String),
}

/// Assembly of a component registry failed.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{} component(s) failed to wrap: {}", .0.len(), join(.0))]
    Wrapping(Vec<WrappingError>),
}

fn join(errors: &[WrappingError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure raised by a component method body.
///
/// Keeps the original error so handlers and future holders can
/// downcast back to the type the body produced.
pub struct MethodError(Box<dyn std::error::Error + Send + Sync>);

impl MethodError {
    /// Wrap any error (or message) raised by a method body.
    pub fn new(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(error.into())
    }

    /// Borrow the original error as a concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Consume and return the boxed original error.
    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync> {
        self.0
    }
}

impl fmt::Debug for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MethodError").field(&self.0).finish()
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for MethodError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

/// Errors that can surface from a call on a (possibly wrapped) component.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error(transparent)]
    ExecutorResolution(#[from] ExecutorResolutionError),

    #[error("Executor '{executor}' rejected task: {reason}")]
    Rejected { executor: String, reason: String },

    #[error("Component '{component}' has no method '{method}'")]
    UnknownMethod { component: String, method: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Method failed: {0}")]
    Method(#[from] MethodError),

    #[error("Method panicked: {0}")]
    Panicked(String),

    #[error("Invocation was cancelled before it started")]
    Cancelled,

    #[error("Invocation was dropped by its executor without completing")]
    Abandoned,
}

impl InvocationError {
    /// Borrow the method body's original error, if this is a body failure.
    pub fn method_error(&self) -> Option<&MethodError> {
        match self {
            Self::Method(e) => Some(e),
            _ => None,
        }
    }
}
