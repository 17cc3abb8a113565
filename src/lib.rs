//! Offload - asynchronous method dispatch for registered components
//!
//! Components declare which methods request async execution through
//! markers. At assembly time an [`AsyncRegistrar`] wraps every component
//! with qualifying methods in an [`AsyncProxy`]; calls to those methods are
//! then handed to a worker while the caller keeps the same call surface.

pub mod advice;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod future;
pub mod handler;
pub mod interceptor;
pub mod marker;
pub mod pipeline;
pub mod registrar;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod utils;

pub use component::{Arguments, Component, ComponentDescriptor, MethodDescriptor, Outcome, ReturnKind};
pub use config::AsyncConfig;
pub use context::{AsyncConfigurer, AsyncContext};
pub use error::{
    AssemblyError, ConfigurationError, ExecutorResolutionError, InvocationError, MethodError,
    WrappingError,
};
pub use executor::{SerialExecutor, TaskExecutor, ThreadPerTaskExecutor, TokioExecutor};
pub use future::InvocationFuture;
pub use handler::{AsyncErrorHandler, LoggingErrorHandler};
pub use interceptor::{AsyncProxy, QualifyingMethod};
pub use marker::{Marker, MarkerAttributes, ProxyStyle};
pub use pipeline::{ComponentRegistry, Order, Pipeline, WrappingStep};
pub use registrar::AsyncRegistrar;
