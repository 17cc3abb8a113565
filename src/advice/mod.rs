//! Aspect-oriented advice for cross-cutting concerns.
//!
//! This module provides wrapping steps that add orthogonal behavior
//! (tracing, timing) without touching component implementations.
//!
//! # Architecture
//!
//! Advice is applied at assembly time, composed with async dispatch in one
//! [`Pipeline`](crate::pipeline::Pipeline):
//!
//! ```ignore
//! let pipeline = Pipeline::new()
//!     .with_step(Arc::new(Traced::new(Order::At(0))))
//!     .with_step(Arc::new(AsyncRegistrar::from_config(Some(&config), context)?));
//!
//! registry.assemble(&pipeline)?;
//! ```
//!
//! # Available Advice
//!
//! - [`Traced`] - Opens a span and logs latency for every call

mod traced;

pub use traced::{Traced, TracedComponent};
