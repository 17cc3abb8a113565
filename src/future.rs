//! Caller-visible handle for future-kind invocations.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::InvocationError;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;
const CANCELLED: u8 = 3;

type Payload = Result<Value, InvocationError>;

/// Handle to the eventual result of an async invocation.
///
/// Await it from async code or call [`wait`](Self::wait) from a plain thread.
/// Cancellation only takes effect before the worker picks the task up.
#[derive(Debug)]
pub struct InvocationFuture {
    state: Arc<AtomicU8>,
    receiver: oneshot::Receiver<Payload>,
}

/// Worker-side half of an [`InvocationFuture`].
///
/// Dropping it without completing resolves the handle to
/// [`InvocationError::Abandoned`].
#[derive(Debug)]
pub(crate) struct Completion {
    state: Arc<AtomicU8>,
    sender: oneshot::Sender<Payload>,
}

impl InvocationFuture {
    pub(crate) fn channel() -> (Self, Completion) {
        let state = Arc::new(AtomicU8::new(PENDING));
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                state: Arc::clone(&state),
                receiver,
            },
            Completion { state, sender },
        )
    }

    /// An already-resolved handle, for method bodies that finish synchronously.
    pub fn ready(result: Result<Value, InvocationError>) -> Self {
        let (future, completion) = Self::channel();
        completion.state.store(RUNNING, Ordering::Release);
        completion.complete(result);
        future
    }

    /// Attempt to cancel the invocation.
    ///
    /// Returns `true` when the task had not started; its body will never run.
    /// Once execution has begun this is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Whether the body has finished (successfully or not).
    pub fn is_finished(&self) -> bool {
        self.state.load(Ordering::Acquire) == FINISHED
    }

    /// Block the current thread until the invocation resolves.
    ///
    /// Must not be called from inside an async task; await the handle there.
    pub fn wait(self) -> Result<Value, InvocationError> {
        futures::executor::block_on(self)
    }
}

impl Future for InvocationFuture {
    type Output = Result<Value, InvocationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.state.load(Ordering::Acquire) == CANCELLED {
            return Poll::Ready(Err(InvocationError::Cancelled));
        }
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(InvocationError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Completion {
    /// Claim the task for execution. Returns `false` if it was cancelled.
    pub(crate) fn start(&self) -> bool {
        self.state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn complete(self, result: Result<Value, InvocationError>) {
        self.state.store(FINISHED, Ordering::Release);
        // Receiver may already be gone; the caller chose not to observe.
        let _ = self.sender.send(result);
    }
}
