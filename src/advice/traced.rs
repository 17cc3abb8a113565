//! Tracing advice.
//!
//! Wraps components so every call runs inside a span and reports its
//! latency, on whichever thread the call arrives.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info_span};

use crate::component::{Arguments, Component, ComponentDescriptor, Outcome};
use crate::error::{Result, WrappingError};
use crate::pipeline::{Order, WrappingStep};

/// Wrapper that traces every call to any component.
///
/// # Example
///
/// ```ignore
/// let mailer: Arc<dyn Component> = Arc::new(Mailer::new());
/// let mailer = TracedComponent::new(mailer);
/// ```
pub struct TracedComponent {
    inner: Arc<dyn Component>,
}

impl TracedComponent {
    pub fn new(inner: Arc<dyn Component>) -> Self {
        Self { inner }
    }

    /// Get a reference to the wrapped component.
    pub fn inner(&self) -> &Arc<dyn Component> {
        &self.inner
    }
}

impl Component for TracedComponent {
    fn descriptor(&self) -> &ComponentDescriptor {
        self.inner.descriptor()
    }

    fn invoke(&self, method: &str, args: &Arguments) -> Result<Outcome> {
        let span = info_span!(
            "component.invoke",
            component = %self.inner.descriptor().name(),
            method = %method
        );
        let _entered = span.enter();
        let start = Instant::now();

        let result = self.inner.invoke(method, args);

        debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            ok = result.is_ok(),
            "Component call returned"
        );
        result
    }

    fn concrete(&self) -> &dyn Any {
        self.inner.concrete()
    }

    fn is_async_dispatching(&self) -> bool {
        self.inner.is_async_dispatching()
    }
}

/// Wrapping step applying [`TracedComponent`] to every component.
#[derive(Debug, Clone, Copy)]
pub struct Traced {
    order: Order,
}

impl Traced {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

impl WrappingStep for Traced {
    fn name(&self) -> &str {
        "traced"
    }

    fn order(&self) -> Order {
        self.order
    }

    fn wrap(&self, component: Arc<dyn Component>) -> std::result::Result<Arc<dyn Component>, WrappingError> {
        Ok(Arc::new(TracedComponent::new(component)))
    }
}
