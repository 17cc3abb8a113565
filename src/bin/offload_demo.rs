//! offload-demo: async dispatch walkthrough
//!
//! Assembles a mailer component behind tracing advice and async dispatch,
//! then performs one call of each return kind.
//!
//! ## Architecture
//! ```text
//! main --invoke--> [Traced] --> [AsyncProxy] --execute--> [TokioExecutor]
//!                                                               |
//!                                                               v
//!                                                            Mailer
//! ```
//!
//! ## Configuration
//! - OFFLOAD_CONFIG: YAML file with async enablement settings (optional)
//! - OFFLOAD_LOG: tracing filter (default: info)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::info;

use offload::advice::Traced;
use offload::utils::bootstrap::init_tracing;
use offload::{
    Arguments, AsyncConfig, AsyncContext, AsyncRegistrar, Component, ComponentDescriptor,
    ComponentRegistry, InvocationError, Marker, MethodDescriptor, Order, Outcome, Pipeline,
    ReturnKind,
};

struct Mailer {
    descriptor: ComponentDescriptor,
    sent: AtomicUsize,
}

impl Mailer {
    fn new() -> Self {
        Self {
            descriptor: ComponentDescriptor::new("mailer")
                .method(MethodDescriptor::new("send", ReturnKind::Void).marked(Marker::ASYNC))
                .method(MethodDescriptor::new("render", ReturnKind::Future).marked(Marker::ASYNC))
                .method(MethodDescriptor::new("sent_count", ReturnKind::Value)),
            sent: AtomicUsize::new(0),
        }
    }
}

impl Component for Mailer {
    fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    fn invoke(&self, method: &str, args: &Arguments) -> Result<Outcome, InvocationError> {
        match method {
            "send" => {
                let to: String = args.parse(0)?;
                std::thread::sleep(Duration::from_millis(50));
                self.sent.fetch_add(1, Ordering::SeqCst);
                info!(to = %to, "Mail sent");
                Ok(Outcome::Unit)
            }
            "render" => {
                let name: String = args.parse(0)?;
                Ok(Outcome::Value(json!(format!("Hello, {}!", name))))
            }
            "sent_count" => Ok(Outcome::Value(json!(self.sent.load(Ordering::SeqCst)))),
            other => Err(self.descriptor.unknown_method(other)),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AsyncConfig::load(None)?;
    let context = Arc::new(AsyncContext::new());

    let pipeline = Pipeline::new()
        .with_step(Arc::new(Traced::new(Order::At(0))))
        .with_step(Arc::new(AsyncRegistrar::from_config(Some(&config), context)?));

    let mut registry = ComponentRegistry::new();
    registry.register(Arc::new(Mailer::new()))?;
    registry.assemble(&pipeline)?;

    let mailer = registry
        .get("mailer")
        .ok_or("mailer component missing after assembly")?;

    mailer.invoke("send", &Arguments::new(vec![json!("ops@example.com")]))?;

    let greeting = mailer
        .invoke("render", &Arguments::new(vec![json!("operator")]))?
        .into_future()
        .ok_or("render did not return a future")?
        .wait()?;
    info!(greeting = %greeting, "Rendered greeting");

    std::thread::sleep(Duration::from_millis(200));
    let count = mailer.invoke("sent_count", &Arguments::empty())?;
    info!(sent = ?count.into_value(), "Mailer state");

    Ok(())
}
