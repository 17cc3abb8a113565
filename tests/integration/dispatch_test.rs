//! End-to-end dispatch through an assembled registry.

use std::sync::Arc;
use std::time::Duration;

use offload::test_utils::{Gate, RecordingHandler, ScriptedComponent};
use offload::{
    Arguments, AsyncConfig, AsyncContext, AsyncErrorHandler, AsyncRegistrar, ComponentDescriptor,
    ComponentRegistry, InvocationError, Marker, MethodDescriptor, MethodError, Outcome, Pipeline,
    ReturnKind, ThreadPerTaskExecutor,
};
use serde_json::json;

const TIMEOUT: Duration = Duration::from_secs(5);

fn billing() -> ScriptedComponent {
    ScriptedComponent::new(
        ComponentDescriptor::new("billing")
            .marked(Marker::ASYNC)
            .method(MethodDescriptor::new("charge", ReturnKind::Future))
            .method(MethodDescriptor::new("notify", ReturnKind::Void))
            .method(MethodDescriptor::new("balance", ReturnKind::Value).inline()),
    )
    .on("charge", |args| {
        let cents: i64 = args.parse(0)?;
        if cents <= 0 {
            return Err(MethodError::new(format!("invalid amount {}", cents)).into());
        }
        Ok(Outcome::Value(json!({
            "charged": cents,
            "thread": std::thread::current().name(),
        })))
    })
    .on("notify", |_| Err(MethodError::new("mail relay down").into()))
    .on("balance", |_| Ok(Outcome::Value(json!(1200))))
}

fn assemble(config: &AsyncConfig, context: Arc<AsyncContext>) -> ComponentRegistry {
    let registrar = AsyncRegistrar::from_config(Some(config), context).unwrap();
    let pipeline = Pipeline::new().with_step(Arc::new(registrar));
    let mut registry = ComponentRegistry::new();
    registry.register(Arc::new(billing())).unwrap();
    registry.assemble(&pipeline).unwrap();
    registry
}

#[tokio::test]
async fn test_future_result_awaited_from_async_code() {
    let config = AsyncConfig::from_yaml("executor: billing-pool\n").unwrap();
    let context = Arc::new(AsyncContext::new());
    context.register_executor(
        "billing-pool",
        Arc::new(ThreadPerTaskExecutor::new("billing-pool").with_thread_prefix("billing-")),
    );
    context.register_executor("reports", Arc::new(ThreadPerTaskExecutor::new("reports")));

    let billing = assemble(&config, context).get("billing").unwrap();

    let receipt = billing
        .invoke("charge", &Arguments::new(vec![json!(250)]))
        .unwrap()
        .into_future()
        .unwrap()
        .await
        .unwrap();
    assert_eq!(receipt["charged"], json!(250));
    assert_eq!(receipt["thread"], json!("billing-1"));

    let err = billing
        .invoke("charge", &Arguments::new(vec![json!(-5)]))
        .unwrap()
        .into_future()
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Method failed: invalid amount -5");
}

#[tokio::test]
async fn test_default_executor_when_none_registered() {
    let billing = assemble(&AsyncConfig::default(), Arc::new(AsyncContext::new()))
        .get("billing")
        .unwrap();

    let receipt = billing
        .invoke("charge", &Arguments::new(vec![json!(10)]))
        .unwrap()
        .into_future()
        .unwrap()
        .await
        .unwrap();
    assert_eq!(receipt["thread"], json!("offload-default-worker"));
}

#[test]
fn test_named_error_handler_from_config() {
    let handler = RecordingHandler::new();
    let context = Arc::new(AsyncContext::new());
    context.register_executor("pool", Arc::new(ThreadPerTaskExecutor::new("pool")));
    let registered: Arc<dyn AsyncErrorHandler> = handler.clone();
    context.register_error_handler("billingErrors", registered);

    let config = AsyncConfig::from_yaml("error_handler: billingErrors\n").unwrap();
    let billing = assemble(&config, context).get("billing").unwrap();

    let args = Arguments::new(vec![json!("customer-7")]);
    assert!(billing.invoke("notify", &args).unwrap().is_unit());
    assert!(handler.wait_for(1, TIMEOUT));

    let failures = handler.failures();
    assert_eq!(failures[0].method.name(), "notify");
    assert_eq!(failures[0].args, args);
    assert_eq!(failures[0].error, "Method failed: mail relay down");
}

#[test]
fn test_inline_method_bypasses_executor() {
    let context = offload::test_utils::context_without_default_executor();
    let billing = assemble(&AsyncConfig::default(), context).get("billing").unwrap();

    let balance = billing.invoke("balance", &Arguments::empty()).unwrap();
    assert_eq!(balance.into_value(), Some(json!(1200)));

    let err = billing.invoke("notify", &Arguments::empty()).unwrap_err();
    assert!(matches!(err, InvocationError::ExecutorResolution(_)));
}

#[test]
fn test_caller_is_not_blocked_by_slow_body() {
    let gate = Gate::new();
    let body_gate = Arc::clone(&gate);
    let component = ScriptedComponent::new(
        ComponentDescriptor::new("exports")
            .method(MethodDescriptor::new("export", ReturnKind::Void).marked(Marker::ASYNC)),
    )
    .on("export", move |_| {
        body_gate.wait(TIMEOUT);
        Ok(Outcome::Unit)
    });
    let component = Arc::new(component);

    let context = Arc::new(AsyncContext::new());
    context.register_executor("pool", Arc::new(ThreadPerTaskExecutor::new("pool")));
    let registrar = AsyncRegistrar::from_config(Some(&AsyncConfig::default()), context).unwrap();
    let proxy = registrar.register(component.clone()).unwrap();

    let started = std::time::Instant::now();
    for _ in 0..3 {
        assert!(proxy.invoke("export", &Arguments::empty()).unwrap().is_unit());
    }
    assert!(started.elapsed() < Duration::from_secs(1));

    gate.open();
    for _ in 0..50 {
        if component.call_count("export") == 3 {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(component.call_count("export"), 3);
}
