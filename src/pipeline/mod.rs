//! Ordered wrapping of registered components.
//!
//! Steps are sorted by `(order, registration sequence)` with
//! [`Order::Unspecified`] last. The first step in that sequence ends up
//! outermost, so steps are applied from the back of the sequence to the
//! front:
//!
//! ```text
//! steps: Traced(At(0)), AsyncRegistrar(Unspecified)
//!
//! caller -> Traced -> AsyncProxy -> component
//!           (caller thread)   (worker thread)
//! ```
//!
//! Leaving the async registrar at its default order therefore makes the
//! hand-off to the worker the innermost layer, and every other step sees
//! the call on the caller's thread.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::component::Component;
use crate::error::{AssemblyError, ConfigurationError, WrappingError};


/// Position of a wrapping step. Lower orders wrap further out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    At(i32),
    /// Sorts after every explicit order.
    #[default]
    Unspecified,
}

impl Ord for Order {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Order::At(a), Order::At(b)) => a.cmp(b),
            (Order::At(_), Order::Unspecified) => Ordering::Less,
            (Order::Unspecified, Order::At(_)) => Ordering::Greater,
            (Order::Unspecified, Order::Unspecified) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Order {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One structural wrapper applied to every registered component.
pub trait WrappingStep: Send + Sync {
    fn name(&self) -> &str;

    fn order(&self) -> Order;

    /// Second setup phase, run once before any component is wrapped.
    fn activate(&self) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Wrap `component`, or hand it back unchanged.
    fn wrap(&self, component: Arc<dyn Component>) -> Result<Arc<dyn Component>, WrappingError>;
}

/// Explicitly ordered list of wrapping steps.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn WrappingStep>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: Arc<dyn WrappingStep>) -> Self {
        self.add(step);
        self
    }

    pub fn add(&mut self, step: Arc<dyn WrappingStep>) {
        self.steps.push(step);
    }

    /// Steps from outermost to innermost.
    pub fn ordered(&self) -> Vec<Arc<dyn WrappingStep>> {
        let mut steps: Vec<_> = self.steps.iter().enumerate().collect();
        // Stable sort keeps registration sequence between equal orders.
        steps.sort_by_key(|(seq, step)| (step.order(), *seq));
        steps.into_iter().map(|(_, step)| Arc::clone(step)).collect()
    }

    pub fn activate(&self) -> Result<(), ConfigurationError> {
        for step in self.ordered() {
            debug!(step = %step.name(), order = ?step.order(), "Activating wrapping step");
            step.activate()?;
        }
        Ok(())
    }

    /// Apply every step to `component`, innermost first.
    pub fn apply(&self, component: Arc<dyn Component>) -> Result<Arc<dyn Component>, WrappingError> {
        self.ordered()
            .iter()
            .rev()
            .try_fold(component, |component, step| step.wrap(component))
    }
}

/// Holds components by name and assembles them through a [`Pipeline`].
#[derive(Default)]
pub struct ComponentRegistry {
    pending: BTreeMap<String, Arc<dyn Component>>,
    assembled: BTreeMap<String, Arc<dyn Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component under its descriptor name.
    pub fn register(&mut self, component: Arc<dyn Component>) -> Result<(), WrappingError> {
        let name = component.name().to_string();
        if self.pending.contains_key(&name) || self.assembled.contains_key(&name) {
            return Err(WrappingError::DuplicateComponent(name));
        }
        self.pending.insert(name, component);
        Ok(())
    }

    /// Activate the pipeline, then wrap every pending component.
    ///
    /// Configuration errors abort before anything is wrapped. Wrapping
    /// errors are collected; failed components are dropped rather than
    /// registered unwrapped, and the rest are still assembled.
    pub fn assemble(&mut self, pipeline: &Pipeline) -> Result<(), AssemblyError> {
        pipeline.activate()?;

        let mut failures = Vec::new();
        for (name, component) in std::mem::take(&mut self.pending) {
            match pipeline.apply(component) {
                Ok(wrapped) => {
                    debug!(component = %name, "Component assembled");
                    self.assembled.insert(name, wrapped);
                }
                Err(e) => {
                    warn!(component = %name, error = %e, "Component failed to wrap");
                    failures.push(e);
                }
            }
        }

        info!(
            assembled = self.assembled.len(),
            failed = failures.len(),
            "Component registry assembled"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AssemblyError::Wrapping(failures))
        }
    }

    /// The assembled (possibly wrapped) component registered as `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.assembled.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assembled.keys().map(String::as_str)
    }
}
