//! Wrapping step that installs async dispatch on components.
//!
//! Construction stores configuration only. Executor and error-handler
//! resolution happen in [`WrappingStep::activate`], which the registry runs
//! once every dependency can be registered, or on the first qualifying call
//! if a proxy is used before activation.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::component::Component;
use crate::config::AsyncConfig;
use crate::context::AsyncContext;
use crate::error::{ConfigurationError, WrappingError};
use crate::executor::{ExecutorRef, ExecutorResolver};
use crate::handler::{ErrorHandlerRef, ErrorHandlerResolver};
use crate::interceptor::{AsyncInterceptor, AsyncProxy, QualificationTable};
use crate::marker::{MarkerAttributes, ProxyStyle};
use crate::pipeline::{Order, WrappingStep};

/// Produces an [`AsyncProxy`] for every component with qualifying methods.
///
/// Holds no per-component state: a component instance that already
/// dispatches asynchronously is refused, while name uniqueness is left to
/// the [`ComponentRegistry`](crate::pipeline::ComponentRegistry).
pub struct AsyncRegistrar {
    attributes: MarkerAttributes,
    executors: Arc<ExecutorResolver>,
    handlers: Arc<ErrorHandlerResolver>,
}

impl AsyncRegistrar {
    pub fn new(
        attributes: MarkerAttributes,
        executors: ExecutorResolver,
        handlers: ErrorHandlerResolver,
    ) -> Self {
        Self {
            attributes,
            executors: Arc::new(executors),
            handlers: Arc::new(handlers),
        }
    }

    /// Build a registrar from enabling metadata.
    ///
    /// A configurer's executor and error handler take precedence over the
    /// names in `config`.
    pub fn from_config(
        config: Option<&AsyncConfig>,
        context: Arc<AsyncContext>,
    ) -> Result<Self, ConfigurationError> {
        let config = config.ok_or(ConfigurationError::MissingMetadata)?;
        let attributes = MarkerAttributes::resolve(Some(config))?;
        let configurer = context.configurer()?;

        let executor = configurer
            .as_ref()
            .and_then(|c| c.async_executor())
            .map(ExecutorRef::Instance)
            .or_else(|| config.executor.clone().map(ExecutorRef::Named));
        let handler = configurer
            .as_ref()
            .and_then(|c| c.async_error_handler())
            .map(ErrorHandlerRef::Instance)
            .or_else(|| config.error_handler.clone().map(ErrorHandlerRef::Named));

        debug!(
            custom_marker = ?attributes.custom_marker(),
            proxy_style = ?attributes.proxy_style(),
            order = ?attributes.order(),
            "Async registrar configured"
        );

        Ok(Self::new(
            attributes,
            ExecutorResolver::new(Arc::clone(&context), executor),
            ErrorHandlerResolver::new(context, handler),
        ))
    }

    pub fn attributes(&self) -> &MarkerAttributes {
        &self.attributes
    }

    /// Wrap `component` if any of its methods qualify.
    ///
    /// Returns the very same reference when nothing qualifies.
    pub fn register(&self, component: Arc<dyn Component>) -> Result<Arc<dyn Component>, WrappingError> {
        let descriptor = component.descriptor();
        let name = descriptor.name().to_string();

        if component.is_async_dispatching() {
            return Err(WrappingError::AlreadyWrapped { component: name });
        }

        let table = QualificationTable::scan(descriptor, &self.attributes);
        if table.is_empty() {
            trace!(component = %name, "No qualifying methods; leaving component unwrapped");
            return Ok(component);
        }

        let style = self.attributes.proxy_style();
        if style == ProxyStyle::TargetClass && descriptor.is_sealed() {
            return Err(WrappingError::Sealed { component: name });
        }

        debug!(
            component = %name,
            qualifying = table.len(),
            style = ?style,
            "Wrapping component for async dispatch"
        );

        let interceptor =
            AsyncInterceptor::new(table, Arc::clone(&self.executors), Arc::clone(&self.handlers));
        Ok(Arc::new(AsyncProxy::new(component, interceptor, style)))
    }
}

impl WrappingStep for AsyncRegistrar {
    fn name(&self) -> &str {
        "async"
    }

    fn order(&self) -> Order {
        self.attributes.order()
    }

    fn activate(&self) -> Result<(), ConfigurationError> {
        self.handlers.activate()?;
        self.executors.activate();
        Ok(())
    }

    fn wrap(&self, component: Arc<dyn Component>) -> Result<Arc<dyn Component>, WrappingError> {
        self.register(component)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::advice::TracedComponent;
    use crate::component::{Arguments, ComponentDescriptor, MethodDescriptor, ReturnKind};
    use crate::context::AsyncConfigurer;
    use crate::error::AssemblyError;
    use crate::executor::{TaskExecutor, ThreadPerTaskExecutor};
    use crate::marker::Marker;
    use crate::pipeline::{ComponentRegistry, Pipeline};
    use crate::test_utils::ScriptedComponent;

    struct PrefixConfigurer;

    impl AsyncConfigurer for PrefixConfigurer {
        fn async_executor(&self) -> Option<Arc<dyn TaskExecutor>> {
            Some(Arc::new(
                ThreadPerTaskExecutor::new("configured").with_thread_prefix("configured-"),
            ))
        }
    }

    fn reports(descriptor: ComponentDescriptor) -> Arc<dyn Component> {
        Arc::new(ScriptedComponent::new(descriptor).on("build", |_| {
            Ok(crate::component::Outcome::Value(json!(std::thread::current().name())))
        }))
    }

    fn reports_descriptor() -> ComponentDescriptor {
        ComponentDescriptor::new("reports")
            .method(MethodDescriptor::new("build", ReturnKind::Future).marked(Marker::ASYNC))
    }

    fn thread_name_of_build(component: &Arc<dyn Component>) -> serde_json::Value {
        component
            .invoke("build", &Arguments::empty())
            .unwrap()
            .into_future()
            .unwrap()
            .wait()
            .unwrap()
    }

    #[test]
    fn test_missing_metadata() {
        let err = AsyncRegistrar::from_config(None, Arc::new(AsyncContext::new())).err();
        assert_eq!(err, Some(ConfigurationError::MissingMetadata));
    }

    #[test]
    fn test_multiple_configurers_rejected() {
        let context = Arc::new(AsyncContext::new());
        context.add_configurer(Arc::new(PrefixConfigurer));
        context.add_configurer(Arc::new(PrefixConfigurer));

        let err = AsyncRegistrar::from_config(Some(&AsyncConfig::default()), context).err();
        assert_eq!(err, Some(ConfigurationError::MultipleConfigurers(2)));
    }

    #[test]
    fn test_configurer_executor_wins_over_configured_name() {
        let context = Arc::new(AsyncContext::new());
        context.register_executor(
            "named",
            Arc::new(ThreadPerTaskExecutor::new("named").with_thread_prefix("named-")),
        );
        context.add_configurer(Arc::new(PrefixConfigurer));
        let config = AsyncConfig {
            executor: Some("named".to_string()),
            ..Default::default()
        };

        let registrar = AsyncRegistrar::from_config(Some(&config), context).unwrap();
        let proxy = registrar.register(reports(reports_descriptor())).unwrap();
        assert_eq!(thread_name_of_build(&proxy), json!("configured-1"));
    }

    #[test]
    fn test_configured_executor_name() {
        let context = Arc::new(AsyncContext::new());
        context.register_executor(
            "named",
            Arc::new(ThreadPerTaskExecutor::new("named").with_thread_prefix("named-")),
        );
        context.register_executor("other", Arc::new(ThreadPerTaskExecutor::new("other")));
        let config = AsyncConfig {
            executor: Some("named".to_string()),
            ..Default::default()
        };

        let registrar = AsyncRegistrar::from_config(Some(&config), context).unwrap();
        let proxy = registrar.register(reports(reports_descriptor())).unwrap();
        assert_eq!(thread_name_of_build(&proxy), json!("named-1"));
    }

    #[test]
    fn test_unqualified_component_is_returned_unchanged() {
        let context = Arc::new(AsyncContext::new());
        let registrar = AsyncRegistrar::from_config(Some(&AsyncConfig::default()), context).unwrap();
        let plain = reports(
            ComponentDescriptor::new("plain").method(MethodDescriptor::new("build", ReturnKind::Future)),
        );

        let result = registrar.register(Arc::clone(&plain)).unwrap();
        assert!(Arc::ptr_eq(&plain, &result));
        assert!(!result.is_async_dispatching());
    }

    #[test]
    fn test_sealed_component_needs_interface_style() {
        let sealed = || reports(reports_descriptor().sealed());
        let context = Arc::new(AsyncContext::new());

        let target_class = AsyncConfig {
            proxy_target_class: true,
            ..Default::default()
        };
        let err = AsyncRegistrar::from_config(Some(&target_class), Arc::clone(&context))
            .unwrap()
            .register(sealed())
            .err();
        assert_eq!(
            err,
            Some(WrappingError::Sealed {
                component: "reports".to_string()
            })
        );

        let interface = AsyncRegistrar::from_config(Some(&AsyncConfig::default()), context)
            .unwrap()
            .register(sealed())
            .unwrap();
        assert!(interface.is_async_dispatching());
    }

    #[test]
    fn test_rewrapping_is_rejected() {
        let context = Arc::new(AsyncContext::new());
        let registrar = AsyncRegistrar::from_config(Some(&AsyncConfig::default()), context).unwrap();
        let proxy = registrar.register(reports(reports_descriptor())).unwrap();

        let already = WrappingError::AlreadyWrapped {
            component: "reports".to_string(),
        };
        assert_eq!(registrar.register(Arc::clone(&proxy)).err(), Some(already.clone()));

        let traced: Arc<dyn Component> = Arc::new(TracedComponent::new(proxy));
        assert_eq!(registrar.register(traced).err(), Some(already));
    }

    #[test]
    fn test_same_name_in_separate_registries() {
        let context = Arc::new(AsyncContext::new());
        let registrar = AsyncRegistrar::from_config(Some(&AsyncConfig::default()), context).unwrap();
        let pipeline = Pipeline::new().with_step(Arc::new(registrar));

        for _ in 0..2 {
            let mut registry = ComponentRegistry::new();
            registry.register(reports(reports_descriptor())).unwrap();
            assert!(registry.assemble(&pipeline).is_ok());
            assert!(registry.get("reports").unwrap().is_async_dispatching());
        }
    }

    #[test]
    fn test_failed_outer_step_does_not_poison_later_passes() {
        struct RejectOnce(std::sync::atomic::AtomicBool);

        impl WrappingStep for RejectOnce {
            fn name(&self) -> &str {
                "reject-once"
            }

            fn order(&self) -> Order {
                Order::At(0)
            }

            fn wrap(&self, component: Arc<dyn Component>) -> Result<Arc<dyn Component>, WrappingError> {
                if self.0.swap(false, std::sync::atomic::Ordering::SeqCst) {
                    return Err(WrappingError::Sealed {
                        component: component.name().to_string(),
                    });
                }
                Ok(component)
            }
        }

        let context = Arc::new(AsyncContext::new());
        let registrar = AsyncRegistrar::from_config(Some(&AsyncConfig::default()), context).unwrap();
        let pipeline = Pipeline::new()
            .with_step(Arc::new(registrar))
            .with_step(Arc::new(RejectOnce(std::sync::atomic::AtomicBool::new(true))));

        let mut first = ComponentRegistry::new();
        first.register(reports(reports_descriptor())).unwrap();
        assert!(matches!(first.assemble(&pipeline), Err(AssemblyError::Wrapping(_))));

        let mut second = ComponentRegistry::new();
        second.register(reports(reports_descriptor())).unwrap();
        assert!(second.assemble(&pipeline).is_ok());
    }

    #[test]
    fn test_custom_marker_matches_alongside_default() {
        let config = AsyncConfig {
            marker: Some(Marker::new("offloaded")),
            ..Default::default()
        };
        let registrar = AsyncRegistrar::from_config(Some(&config), Arc::new(AsyncContext::new())).unwrap();
        assert_eq!(registrar.attributes().custom_marker(), Some(&Marker::new("offloaded")));

        let descriptor = ComponentDescriptor::new("jobs")
            .method(MethodDescriptor::new("archive", ReturnKind::Void).marked("offloaded"))
            .method(MethodDescriptor::new("purge", ReturnKind::Void).marked(Marker::ASYNC))
            .method(MethodDescriptor::new("count", ReturnKind::Value).marked("cached"));
        let proxy = registrar
            .register(Arc::new(ScriptedComponent::new(descriptor)))
            .unwrap();

        let table = proxy
            .downcast_ref::<AsyncProxy>()
            .map(|p| p.interceptor().table().clone())
            .unwrap();
        assert!(table.contains("archive"));
        assert!(table.contains("purge"));
        assert!(!table.contains("count"));
    }

    #[test]
    fn test_activation_reports_unknown_error_handler() {
        let config = AsyncConfig {
            error_handler: Some("auditErrors".to_string()),
            ..Default::default()
        };
        let registrar = AsyncRegistrar::from_config(Some(&config), Arc::new(AsyncContext::new())).unwrap();
        assert_eq!(
            registrar.activate(),
            Err(ConfigurationError::UnknownErrorHandler("auditErrors".to_string()))
        );
        assert_eq!(registrar.name(), "async");
        assert_eq!(registrar.order(), Order::Unspecified);
    }
}
