//! Call-time dispatch of qualifying methods.
//!
//! Each call moves through `received -> classified -> submitted -> completed
//! | failed`. The declared return kind decides what the caller gets back and
//! where a failure goes:
//!
//! | Return kind | Caller receives | Body failure goes to |
//! |---|---|---|
//! | `Future` | [`InvocationFuture`] completed by the worker | the future |
//! | `Void` | [`Outcome::Unit`] immediately | the error handler |
//! | `Value` | [`Outcome::Value`] holding `null` immediately | the error handler |
//!
//! Executor resolution and submission failures are returned synchronously
//! for every kind; there is no fallback to running on the caller thread. A
//! task the executor accepts but drops unrun resolves the handle, or reaches
//! the error handler, as [`InvocationError::Abandoned`].

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::component::{Arguments, Component, ComponentDescriptor, Outcome, ReturnKind};
use crate::error::{InvocationError, Result};
use crate::executor::ExecutorResolver;
use crate::future::InvocationFuture;
use crate::handler::ErrorHandlerResolver;
use crate::marker::MarkerAttributes;

mod proxy;

pub use proxy::AsyncProxy;


/// A method selected for async dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifyingMethod {
    name: String,
    component: String,
    return_kind: ReturnKind,
    executor: Option<String>,
}

impl QualifyingMethod {
    pub fn new(
        name: impl Into<String>,
        component: impl Into<String>,
        return_kind: ReturnKind,
        executor: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            component: component.into(),
            return_kind,
            executor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the declaring component.
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn return_kind(&self) -> ReturnKind {
        self.return_kind
    }

    /// Executor qualifier, if the method names one.
    pub fn executor(&self) -> Option<&str> {
        self.executor.as_deref()
    }
}

/// Qualifying methods of one component, keyed by method name.
#[derive(Debug, Clone, Default)]
pub struct QualificationTable {
    methods: HashMap<String, Arc<QualifyingMethod>>,
}

impl QualificationTable {
    /// Select the methods of `descriptor` that request async dispatch.
    ///
    /// A method qualifies when it carries a matching marker itself, or when
    /// the component carries one and the method has not opted out.
    pub fn scan(descriptor: &ComponentDescriptor, attributes: &MarkerAttributes) -> Self {
        let type_level = descriptor.markers().iter().any(|m| attributes.matches(m));

        let methods = descriptor
            .methods()
            .iter()
            .filter(|method| {
                let method_level = method.markers().iter().any(|m| attributes.matches(m));
                method_level || (type_level && !method.is_inline())
            })
            .map(|method| {
                trace!(
                    component = %descriptor.name(),
                    method = %method.name(),
                    return_kind = ?method.return_kind(),
                    "Method qualifies for async dispatch"
                );
                let qualifying = QualifyingMethod::new(
                    method.name(),
                    descriptor.name(),
                    method.return_kind(),
                    method.executor_name().map(str::to_string),
                );
                (method.name().to_string(), Arc::new(qualifying))
            })
            .collect();

        Self { methods }
    }

    pub fn get(&self, method: &str) -> Option<&Arc<QualifyingMethod>> {
        self.methods.get(method)
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Per-call record handed to the worker.
#[derive(Debug, Clone)]
pub struct PendingInvocation {
    id: Uuid,
    method: Arc<QualifyingMethod>,
    args: Arguments,
    submitted_at: DateTime<Utc>,
}

impl PendingInvocation {
    fn new(method: Arc<QualifyingMethod>, args: Arguments) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            args,
            submitted_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &QualifyingMethod {
        &self.method
    }

    pub fn args(&self) -> &Arguments {
        &self.args
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Run the real method body, converting panics into errors.
    fn run(&self, target: &dyn Component) -> Result<Value> {
        let started = Utc::now();
        debug!(
            invocation = %self.id,
            method = %self.method.name(),
            queued_ms = (started - self.submitted_at).num_milliseconds(),
            "Running async invocation"
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| target.invoke(self.method.name(), &self.args)))
            .unwrap_or_else(|payload| Err(InvocationError::Panicked(panic_message(payload.as_ref()))))?;

        match outcome {
            Outcome::Unit => Ok(Value::Null),
            Outcome::Value(value) => Ok(value),
            Outcome::Future(future) => future.wait(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

const SUBMITTING: u8 = 0;
const ACCEPTED: u8 = 1;
const DROPPED: u8 = 2;

/// Fire-and-forget task whose failures go to the error handler.
///
/// A task an executor accepts and then drops unrun reports
/// [`InvocationError::Abandoned`] exactly once. If the drop happens while
/// `execute` is still on the stack, the submitting thread reports it after
/// `execute` returns `Ok`; a rejected task reports nothing, since the caller
/// already gets [`InvocationError::Rejected`].
struct DetachedInvocation {
    pending: PendingInvocation,
    target: Arc<dyn Component>,
    handlers: Arc<ErrorHandlerResolver>,
    submission: Arc<AtomicU8>,
    ran: bool,
}

impl DetachedInvocation {
    fn run(mut self) {
        self.ran = true;
        if let Err(error) = self.pending.run(self.target.as_ref()) {
            debug!(invocation = %self.pending.id(), error = %error, "Async invocation failed");
            self.report(&error);
        }
    }

    fn report(&self, error: &InvocationError) {
        self.handlers
            .handler()
            .handle(self.pending.method(), self.pending.args(), error);
    }
}

impl Drop for DetachedInvocation {
    fn drop(&mut self) {
        if self.ran {
            return;
        }
        let during_submit = self
            .submission
            .compare_exchange(SUBMITTING, DROPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !during_submit {
            warn!(invocation = %self.pending.id(), "Executor dropped async invocation before running it");
            self.report(&InvocationError::Abandoned);
        }
    }
}

/// Dispatches qualifying calls of one wrapped component to its executor.
///
/// The resolvers are shared, read-only after resolution, by every method of
/// the component; each call gets its own [`PendingInvocation`].
pub struct AsyncInterceptor {
    table: QualificationTable,
    executors: Arc<ExecutorResolver>,
    handlers: Arc<ErrorHandlerResolver>,
}

impl AsyncInterceptor {
    pub fn new(
        table: QualificationTable,
        executors: Arc<ExecutorResolver>,
        handlers: Arc<ErrorHandlerResolver>,
    ) -> Self {
        Self {
            table,
            executors,
            handlers,
        }
    }

    pub fn table(&self) -> &QualificationTable {
        &self.table
    }

    /// Intercept a call to `method` on `target`.
    ///
    /// Non-qualifying methods run inline on the caller thread.
    pub fn invoke(&self, target: &Arc<dyn Component>, method: &str, args: &Arguments) -> Result<Outcome> {
        match self.table.get(method) {
            Some(qualifying) => self.dispatch(target, Arc::clone(qualifying), args.clone()),
            None => target.invoke(method, args),
        }
    }

    fn dispatch(
        &self,
        target: &Arc<dyn Component>,
        method: Arc<QualifyingMethod>,
        args: Arguments,
    ) -> Result<Outcome> {
        let executor = self.executors.resolve(method.executor())?;
        let kind = method.return_kind();
        let pending = PendingInvocation::new(method, args);
        let target = Arc::clone(target);

        debug!(
            invocation = %pending.id(),
            component = %pending.method().component(),
            method = %pending.method().name(),
            executor = %executor.name(),
            return_kind = ?kind,
            "Submitting async invocation"
        );

        let reject = |e: crate::executor::Rejected| InvocationError::Rejected {
            executor: executor.name().to_string(),
            reason: e.0,
        };

        match kind {
            ReturnKind::Future => {
                let (future, completion) = InvocationFuture::channel();
                executor
                    .execute(Box::new(move || {
                        if !completion.start() {
                            debug!(invocation = %pending.id(), "Skipping cancelled invocation");
                            return;
                        }
                        let result = pending.run(target.as_ref());
                        debug!(invocation = %pending.id(), ok = result.is_ok(), "Async invocation completed");
                        completion.complete(result);
                    }))
                    .map_err(reject)?;
                Ok(Outcome::Future(future))
            }
            ReturnKind::Void | ReturnKind::Value => {
                let submission = Arc::new(AtomicU8::new(SUBMITTING));
                let record = pending.clone();
                let detached = DetachedInvocation {
                    pending,
                    target,
                    handlers: Arc::clone(&self.handlers),
                    submission: Arc::clone(&submission),
                    ran: false,
                };
                executor
                    .execute(Box::new(move || detached.run()))
                    .map_err(reject)?;

                let accepted = submission
                    .compare_exchange(SUBMITTING, ACCEPTED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if !accepted {
                    warn!(invocation = %record.id(), "Executor dropped async invocation during submission");
                    self.handlers.handler().handle(
                        record.method(),
                        record.args(),
                        &InvocationError::Abandoned,
                    );
                }
                Ok(match kind {
                    ReturnKind::Void => Outcome::Unit,
                    _ => Outcome::Value(Value::Null),
                })
            }
        }
    }
}
