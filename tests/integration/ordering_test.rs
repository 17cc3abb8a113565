//! Composition of async dispatch with other wrapping steps.

use std::any::Any;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use offload::advice::Traced;
use offload::test_utils::ScriptedComponent;
use offload::{
    Arguments, AsyncConfig, AsyncContext, AsyncRegistrar, Component, ComponentDescriptor,
    ComponentRegistry, InvocationError, Marker, MethodDescriptor, Order, Outcome, Pipeline,
    ReturnKind, ThreadPerTaskExecutor, WrappingError, WrappingStep,
};

/// Records the thread every call arrives on.
struct ThreadProbe {
    inner: Arc<dyn Component>,
    seen: Arc<Mutex<Vec<ThreadId>>>,
}

impl Component for ThreadProbe {
    fn descriptor(&self) -> &ComponentDescriptor {
        self.inner.descriptor()
    }

    fn invoke(&self, method: &str, args: &Arguments) -> Result<Outcome, InvocationError> {
        self.seen.lock().unwrap().push(std::thread::current().id());
        self.inner.invoke(method, args)
    }

    fn concrete(&self) -> &dyn Any {
        self.inner.concrete()
    }

    fn is_async_dispatching(&self) -> bool {
        self.inner.is_async_dispatching()
    }
}

struct ProbeStep {
    order: Order,
    seen: Arc<Mutex<Vec<ThreadId>>>,
}

impl WrappingStep for ProbeStep {
    fn name(&self) -> &str {
        "probe"
    }

    fn order(&self) -> Order {
        self.order
    }

    fn wrap(&self, component: Arc<dyn Component>) -> Result<Arc<dyn Component>, WrappingError> {
        Ok(Arc::new(ThreadProbe {
            inner: component,
            seen: Arc::clone(&self.seen),
        }))
    }
}

type Seen = Arc<Mutex<Vec<ThreadId>>>;

fn probed_registry(config: &AsyncConfig, probe_order: Order) -> (ComponentRegistry, Seen) {
    let context = Arc::new(AsyncContext::new());
    context.register_executor("pool", Arc::new(ThreadPerTaskExecutor::new("pool")));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Pipeline::new()
        .with_step(Arc::new(AsyncRegistrar::from_config(Some(config), context).unwrap()))
        .with_step(Arc::new(ProbeStep {
            order: probe_order,
            seen: Arc::clone(&seen),
        }))
        .with_step(Arc::new(Traced::new(Order::At(100))));

    let mut registry = ComponentRegistry::new();
    registry
        .register(Arc::new(ScriptedComponent::new(
            ComponentDescriptor::new("indexer")
                .method(MethodDescriptor::new("reindex", ReturnKind::Future).marked(Marker::ASYNC)),
        )))
        .unwrap();
    registry.assemble(&pipeline).unwrap();
    (registry, seen)
}

fn reindex(registry: &ComponentRegistry) {
    registry
        .get("indexer")
        .unwrap()
        .invoke("reindex", &Arguments::empty())
        .unwrap()
        .into_future()
        .unwrap()
        .wait()
        .unwrap();
}

#[test]
fn test_default_order_keeps_other_steps_on_caller_thread() {
    let (registry, seen) = probed_registry(&AsyncConfig::default(), Order::At(0));
    reindex(&registry);

    assert_eq!(*seen.lock().unwrap(), vec![std::thread::current().id()]);
}

#[test]
fn test_outer_async_moves_inner_steps_to_worker() {
    let config = AsyncConfig {
        order: Some(-1),
        ..Default::default()
    };
    let (registry, seen) = probed_registry(&config, Order::At(0));
    reindex(&registry);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_ne!(seen[0], std::thread::current().id());
}

#[test]
fn test_wrapped_component_still_reports_async_dispatch() {
    let (registry, _) = probed_registry(&AsyncConfig::default(), Order::At(0));
    let indexer = registry.get("indexer").unwrap();

    assert!(indexer.is_async_dispatching());
    assert!(indexer.downcast_ref::<offload::AsyncProxy>().is_some());
}

#[test]
fn test_reassembly_through_same_registrar_is_rejected() {
    let context = Arc::new(AsyncContext::new());
    context.register_executor("pool", Arc::new(ThreadPerTaskExecutor::new("pool")));
    let registrar = Arc::new(AsyncRegistrar::from_config(Some(&AsyncConfig::default()), context).unwrap());
    let pipeline = Pipeline::new()
        .with_step(registrar.clone())
        .with_step(Arc::new(Traced::new(Order::At(0))));

    let mut registry = ComponentRegistry::new();
    registry
        .register(Arc::new(ScriptedComponent::new(
            ComponentDescriptor::new("indexer")
                .marked(Marker::ASYNC)
                .method(MethodDescriptor::new("reindex", ReturnKind::Void)),
        )))
        .unwrap();
    registry.assemble(&pipeline).unwrap();

    // Feeding an assembled component back through the pipeline finds the proxy.
    let assembled = registry.get("indexer").unwrap();
    let err = pipeline.apply(assembled).err();
    assert_eq!(
        err,
        Some(WrappingError::AlreadyWrapped {
            component: "indexer".to_string()
        })
    );
}
