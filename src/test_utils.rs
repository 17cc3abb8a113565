//! Test utilities and mock implementations.
//!
//! Scripted components, recording error handlers and latches for driving
//! async dispatch in tests without real workloads.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::ThreadId;
use std::time::Duration;

use crate::component::{Arguments, Component, ComponentDescriptor, Outcome};
use crate::context::AsyncContext;
use crate::error::{InvocationError, Result};
use crate::handler::AsyncErrorHandler;
use crate::interceptor::QualifyingMethod;

type Behavior = Arc<dyn Fn(&Arguments) -> Result<Outcome> + Send + Sync>;

/// One observed call on a [`ScriptedComponent`].
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub method: String,
    pub args: Arguments,
    pub thread: ThreadId,
}

/// Component whose method bodies are closures supplied by the test.
///
/// Records every call with the thread it ran on. Methods without a
/// behavior return [`Outcome::Unit`].
pub struct ScriptedComponent {
    descriptor: ComponentDescriptor,
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<CallRecord>>,
}

impl ScriptedComponent {
    pub fn new(descriptor: ComponentDescriptor) -> Self {
        Self {
            descriptor,
            behaviors: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script the body of `method`.
    pub fn on<F>(mut self, method: &str, body: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Outcome> + Send + Sync + 'static,
    {
        self.behaviors.insert(method.to_string(), Arc::new(body));
        self
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.method == method)
            .count()
    }
}

impl Component for ScriptedComponent {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    fn invoke(&self, method: &str, args: &Arguments) -> Result<Outcome> {
        if self.descriptor.find_method(method).is_none() {
            return Err(self.descriptor.unknown_method(method));
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CallRecord {
                method: method.to_string(),
                args: args.clone(),
                thread: std::thread::current().id(),
            });
        match self.behaviors.get(method) {
            Some(body) => body(args),
            None => Ok(Outcome::Unit),
        }
    }
}

/// A failure delivered to a [`RecordingHandler`].
#[derive(Debug, Clone)]
pub struct HandledFailure {
    pub method: QualifyingMethod,
    pub args: Arguments,
    pub error: String,
    pub thread: ThreadId,
}

/// Error handler that records every failure it receives.
#[derive(Default)]
pub struct RecordingHandler {
    failures: Mutex<Vec<HandledFailure>>,
    signal: Condvar,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failures(&self) -> Vec<HandledFailure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait until at least `count` failures arrived. Returns `false` on timeout.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let guard = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .signal
            .wait_timeout_while(guard, timeout, |failures| failures.len() < count)
            .unwrap_or_else(PoisonError::into_inner);
        guard.len() >= count
    }
}

impl AsyncErrorHandler for RecordingHandler {
    fn handle(&self, method: &QualifyingMethod, args: &Arguments, error: &InvocationError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(HandledFailure {
                method: method.clone(),
                args: args.clone(),
                error: error.to_string(),
                thread: std::thread::current().id(),
            });
        self.signal.notify_all();
    }
}

/// One-shot latch for holding method bodies until the test releases them.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    signal: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.signal.notify_all();
    }

    /// Block until opened. Returns `false` on timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        let guard = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .signal
            .wait_timeout_while(guard, timeout, |open| !*open)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Context whose default executor can never be built.
pub fn context_without_default_executor() -> Arc<AsyncContext> {
    Arc::new(
        AsyncContext::new()
            .with_default_executor(|| Err(std::io::Error::other("executor capacity exhausted"))),
    )
}
