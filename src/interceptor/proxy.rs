use std::any::Any;
use std::sync::Arc;

use super::AsyncInterceptor;
use crate::component::{Arguments, Component, ComponentDescriptor, Outcome};
use crate::error::Result;
use crate::marker::ProxyStyle;

/// Call-compatible stand-in for a component with qualifying methods.
///
/// Owns exactly one [`AsyncInterceptor`] covering every qualifying method
/// of its target. Presents the target's descriptor, so callers and other
/// wrappers see the same surface.
pub struct AsyncProxy {
    target: Arc<dyn Component>,
    interceptor: AsyncInterceptor,
    style: ProxyStyle,
}

impl AsyncProxy {
    pub fn new(target: Arc<dyn Component>, interceptor: AsyncInterceptor, style: ProxyStyle) -> Self {
        Self {
            target,
            interceptor,
            style,
        }
    }

    pub fn target(&self) -> &Arc<dyn Component> {
        &self.target
    }

    pub fn interceptor(&self) -> &AsyncInterceptor {
        &self.interceptor
    }

    pub fn style(&self) -> ProxyStyle {
        self.style
    }
}

impl Component for AsyncProxy {
    fn descriptor(&self) -> &ComponentDescriptor {
        self.target.descriptor()
    }

    fn invoke(&self, method: &str, args: &Arguments) -> Result<Outcome> {
        self.interceptor.invoke(&self.target, method, args)
    }

    fn concrete(&self) -> &dyn Any {
        match self.style {
            ProxyStyle::TargetClass => self.target.concrete(),
            ProxyStyle::Interface => self,
        }
    }

    fn is_async_dispatching(&self) -> bool {
        true
    }
}
