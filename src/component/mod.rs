//! Component call surface.
//!
//! Components describe their methods explicitly through a
//! [`ComponentDescriptor`]; nothing is discovered by reflection. Calls cross
//! the surface as JSON values so a wrapper can stand in for any component
//! without knowing its concrete type.
//!
//! ```ignore
//! struct Mailer { descriptor: ComponentDescriptor }
//!
//! impl Mailer {
//!     fn new() -> Self {
//!         let descriptor = ComponentDescriptor::new("mailer")
//!             .method(MethodDescriptor::new("send", ReturnKind::Void).marked(Marker::ASYNC))
//!             .method(MethodDescriptor::new("outbox_len", ReturnKind::Value));
//!         Self { descriptor }
//!     }
//! }
//! ```

use std::any::Any;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{InvocationError, Result};
use crate::future::InvocationFuture;
use crate::marker::Marker;


/// Declared return shape of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// Nothing is returned.
    Void,
    /// A handle the caller can wait on for a value or a failure.
    Future,
    /// A concrete value.
    Value,
}

/// One method a component exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    return_kind: ReturnKind,
    markers: Vec<Marker>,
    inline: bool,
    executor: Option<String>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, return_kind: ReturnKind) -> Self {
        Self {
            name: name.into(),
            return_kind,
            markers: Vec::new(),
            inline: false,
            executor: None,
        }
    }

    /// Attach a marker to this method.
    pub fn marked(mut self, marker: impl Into<Marker>) -> Self {
        self.markers.push(marker.into());
        self
    }

    /// Keep this method on the caller thread even when the component carries
    /// a type-level marker.
    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// Name the executor this method should run on.
    pub fn executor(mut self, name: impl Into<String>) -> Self {
        self.executor = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_kind(&self) -> ReturnKind {
        self.return_kind
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    pub fn executor_name(&self) -> Option<&str> {
        self.executor.as_deref()
    }
}

/// Static description of a component: identity, type-level markers and methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    name: String,
    markers: Vec<Marker>,
    methods: Vec<MethodDescriptor>,
    sealed: bool,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            markers: Vec::new(),
            methods: Vec::new(),
            sealed: false,
        }
    }

    /// Attach a type-level marker; every method qualifies unless it opts out.
    pub fn marked(mut self, marker: impl Into<Marker>) -> Self {
        self.markers.push(marker.into());
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Forbid wrappers that expose the concrete type.
    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Error for a call naming a method this component does not declare.
    pub fn unknown_method(&self, method: &str) -> InvocationError {
        InvocationError::UnknownMethod {
            component: self.name.clone(),
            method: method.to_string(),
        }
    }
}

/// Positional call arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Vec<Value>);

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    /// Deserialize the argument at `index`.
    pub fn parse<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self
            .0
            .get(index)
            .ok_or_else(|| InvocationError::InvalidArgument(format!("missing argument {}", index)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| InvocationError::InvalidArgument(format!("argument {}: {}", index, e)))
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Array(self.0.clone()))
    }
}

/// What a call hands back to its caller.
#[derive(Debug)]
pub enum Outcome {
    Unit,
    Value(Value),
    Future(InvocationFuture),
}

impl Outcome {
    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_future(self) -> Option<InvocationFuture> {
        match self {
            Self::Future(f) => Some(f),
            _ => None,
        }
    }
}

/// Upcast helper so default methods on [`Component`] can reach `Any`.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A registered object whose methods may be intercepted.
pub trait Component: AsAny + Send + Sync {
    /// Static description of this component.
    fn descriptor(&self) -> &ComponentDescriptor;

    /// Run `method` on the calling thread.
    fn invoke(&self, method: &str, args: &Arguments) -> Result<Outcome>;

    /// The object a concrete-type lookup should see.
    ///
    /// Wrappers that preserve the concrete type forward to their target.
    fn concrete(&self) -> &dyn Any {
        self.as_any()
    }

    /// Whether calls already pass through an async dispatcher somewhere in
    /// this wrapper chain.
    fn is_async_dispatching(&self) -> bool {
        false
    }
}

impl dyn Component {
    /// Borrow the concrete type visible through this component.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.concrete().downcast_ref::<T>()
    }

    pub fn name(&self) -> &str {
        self.descriptor().name()
    }
}
