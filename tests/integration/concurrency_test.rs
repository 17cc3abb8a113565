//! Concurrent callers sharing one wrapped component.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use offload::executor::{ExecutorRef, ExecutorResolver};
use offload::handler::{ErrorHandlerRef, ErrorHandlerResolver};
use offload::test_utils::{RecordingHandler, ScriptedComponent};
use offload::{
    Arguments, AsyncContext, AsyncErrorHandler, AsyncRegistrar, Component, ComponentDescriptor,
    Marker, MarkerAttributes, MethodDescriptor, MethodError, Outcome, ReturnKind, SerialExecutor,
    ThreadPerTaskExecutor,
};
use serde_json::json;

const CALLERS: usize = 8;
const CALLS_PER_CALLER: usize = 25;

fn scorer() -> ScriptedComponent {
    ScriptedComponent::new(
        ComponentDescriptor::new("scorer")
            .marked(Marker::ASYNC)
            .method(MethodDescriptor::new("score", ReturnKind::Future))
            .method(MethodDescriptor::new("audit", ReturnKind::Void)),
    )
    .on("score", |args| {
        let caller: u64 = args.parse(0)?;
        let call: u64 = args.parse(1)?;
        Ok(Outcome::Value(json!(caller * 1000 + call)))
    })
    .on("audit", |args| {
        let caller: u64 = args.parse(0)?;
        Err(MethodError::new(format!("audit rejected for caller {}", caller)).into())
    })
}

fn wrap(executor: ExecutorRef, handler: Arc<RecordingHandler>) -> Arc<dyn Component> {
    let context = Arc::new(AsyncContext::new());
    let handler: Arc<dyn AsyncErrorHandler> = handler;
    let registrar = AsyncRegistrar::new(
        MarkerAttributes::default(),
        ExecutorResolver::new(Arc::clone(&context), Some(executor)),
        ErrorHandlerResolver::new(context, Some(ErrorHandlerRef::Instance(handler))),
    );
    registrar.register(Arc::new(scorer())).unwrap()
}

#[test]
fn test_concurrent_futures_do_not_cross_talk() {
    let scorer = wrap(
        ExecutorRef::Instance(Arc::new(ThreadPerTaskExecutor::new("scoring"))),
        RecordingHandler::new(),
    );
    let barrier = Arc::new(Barrier::new(CALLERS));

    let callers: Vec<_> = (0..CALLERS)
        .map(|caller| {
            let scorer = Arc::clone(&scorer);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let futures: Vec<_> = (0..CALLS_PER_CALLER)
                    .map(|call| {
                        let args = Arguments::new(vec![json!(caller), json!(call)]);
                        scorer.invoke("score", &args).unwrap().into_future().unwrap()
                    })
                    .collect();
                futures
                    .into_iter()
                    .enumerate()
                    .map(|(call, future)| (call, future.wait().unwrap()))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for (caller, handle) in callers.into_iter().enumerate() {
        for (call, score) in handle.join().unwrap() {
            assert_eq!(score, json!(caller * 1000 + call));
        }
    }
}

#[test]
fn test_concurrent_failures_reach_handler_with_own_arguments() {
    let handler = RecordingHandler::new();
    let serial = SerialExecutor::new("audits", 4).unwrap();
    let scorer = wrap(ExecutorRef::Instance(Arc::new(serial)), Arc::clone(&handler));

    let callers: Vec<_> = (0..CALLERS)
        .map(|caller| {
            let scorer = Arc::clone(&scorer);
            thread::spawn(move || {
                let args = Arguments::new(vec![json!(caller)]);
                assert!(scorer.invoke("audit", &args).unwrap().is_unit());
            })
        })
        .collect();
    for handle in callers {
        handle.join().unwrap();
    }

    assert!(handler.wait_for(CALLERS, Duration::from_secs(5)));
    let failures = handler.failures();
    assert_eq!(failures.len(), CALLERS);
    for failure in failures {
        let caller: u64 = failure.args.parse(0).unwrap();
        assert_eq!(failure.error, format!("Method failed: audit rejected for caller {}", caller));
    }
}
