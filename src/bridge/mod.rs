//! Single-emission bridges over callback-driven calls.
//!
//! A [`Bridge`] pairs a request description with an executor and a
//! projection. It is cold: nothing happens until someone subscribes, and
//! every subscription runs one fresh, independent call. Each subscription
//! delivers exactly one terminal sequence:
//!
//! - `on_next(item)` then `on_complete()` once the executor reports back;
//! - `on_error(fault)` if the bridging machinery itself broke;
//! - nothing at all, if the subscription was cancelled first.
//!
//! Request failures (bad statuses, unreachable hosts, malformed bodies) are
//! part of the item, never a [`BridgeFault`].
//!
//! # Cancellation
//!
//! [`Subscription::cancel`] and delivery race through a single atomic
//! compare-and-swap. Once `cancel` has returned, no event will start being
//! delivered; an event whose delivery already started is allowed to finish.

mod observer;
mod stream;

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU8, Ordering},
    },
};

use snafu::Snafu;

use crate::{
    executor::{CancelHandle, Completion, RequestExecutor},
    outcome::panic_message,
    projection::{Exchange, Projection},
    request::Request,
};

pub use observer::{Event, FnObserver, Observer, Recorder};
pub use stream::BridgeStream;

/// A failure of the bridging machinery, as opposed to a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum BridgeFault {
    /// The executor dropped its completion without reporting the call.
    #[snafu(display("Executor dropped the completion without reporting the call"))]
    CompletionDropped,
    /// The projection panicked while building the item.
    #[snafu(display("Projection panicked: {message}"))]
    ProjectionPanicked {
        /// The panic message, if it was a string.
        message: String,
    },
    /// The subscription ended without delivering any event.
    #[snafu(display("Subscription ended without a terminal event"))]
    MissingTerminalEvent,
}

/// A cold, single-emission stream over one request.
pub struct Bridge<X, P> {
    executor: Arc<X>,
    request: Request,
    projection: Arc<P>,
}

impl<X, P> Clone for Bridge<X, P> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            request: self.request.clone(),
            projection: Arc::clone(&self.projection),
        }
    }
}

impl<X, P> std::fmt::Debug for Bridge<X, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("method", self.request.method())
            .field("url", self.request.url())
            .finish_non_exhaustive()
    }
}

impl<X: RequestExecutor, P: Projection> Bridge<X, P> {
    /// Creates a bridge. No call is made until a subscription.
    pub fn new(executor: Arc<X>, request: Request, projection: P) -> Self {
        Self {
            executor,
            request,
            projection: Arc::new(projection),
        }
    }

    /// Returns the request this bridge sends.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Starts one call and delivers its terminal event to `observer`.
    ///
    /// Dropping the returned [`Subscription`] does not cancel the call.
    pub fn subscribe<O: Observer<P::Item>>(&self, observer: O) -> Subscription {
        let shared = Arc::new(Shared::default());
        let completion = self.completion(Arc::clone(&shared), observer);

        tracing::debug!(
            method = %self.request.method(),
            url = %self.request.url(),
            "starting call"
        );
        let handle = self.executor.execute(self.request.clone(), completion);
        shared.attach(Box::new(handle));

        Subscription { shared }
    }

    /// Like [`subscribe`](Self::subscribe), with one closure per event.
    pub fn subscribe_with<N, E, C>(&self, on_next: N, on_error: E, on_complete: C) -> Subscription
    where
        N: FnMut(P::Item) + Send + 'static,
        E: FnMut(BridgeFault) + Send + 'static,
        C: FnMut() + Send + 'static,
    {
        self.subscribe(FnObserver::new(on_next, on_error, on_complete))
    }

    /// Returns a stream that subscribes when first polled.
    ///
    /// The stream yields exactly one item, `Err` only for a [`BridgeFault`],
    /// and then ends. Dropping it before then cancels the call.
    #[must_use]
    pub fn stream(&self) -> BridgeStream<P::Item> {
        let bridge = self.clone();
        BridgeStream::new(move |observer| bridge.subscribe(observer))
    }

    /// Runs one call and returns its item.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeFault`] only if the bridging machinery failed; a
    /// failed request is reported inside the item.
    pub async fn single(&self) -> Result<P::Item, BridgeFault> {
        use futures::StreamExt as _;

        self.stream()
            .next()
            .await
            .unwrap_or(Err(BridgeFault::MissingTerminalEvent))
    }

    fn completion<O: Observer<P::Item>>(&self, shared: Arc<Shared>, mut observer: O) -> Completion {
        let projection = Arc::clone(&self.projection);
        let request = self.request.clone();

        Completion::new(move |delivery| {
            let Some((response, outcome)) = delivery else {
                if shared.terminate() {
                    tracing::warn!(url = %request.url(), "executor dropped a completion");
                    observer.on_error(BridgeFault::CompletionDropped);
                }
                return;
            };

            if !shared.terminate() {
                tracing::trace!(url = %request.url(), "call finished after cancellation");
                return;
            }

            let exchange = Exchange {
                request,
                response,
                outcome,
            };
            match catch_unwind(AssertUnwindSafe(|| projection.project(exchange))) {
                Ok(item) => {
                    observer.on_next(item);
                    observer.on_complete();
                }
                Err(payload) => observer.on_error(BridgeFault::ProjectionPanicked {
                    message: panic_message(payload.as_ref()),
                }),
            }
        })
    }
}

const PENDING: u8 = 0;
const TERMINATED: u8 = 1;
const CANCELLED: u8 = 2;

struct Shared {
    state: AtomicU8,
    cancel_handle: Mutex<Option<Box<dyn CancelHandle>>>,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(PENDING),
            cancel_handle: Mutex::new(None),
        }
    }
}

impl Shared {
    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claims the right to deliver the terminal event.
    fn terminate(&self) -> bool {
        if !self.transition(TERMINATED) {
            return false;
        }
        drop(self.take_handle());
        true
    }

    fn cancel(&self) -> bool {
        if !self.transition(CANCELLED) {
            return false;
        }
        if let Some(handle) = self.take_handle() {
            handle.cancel();
        }
        true
    }

    /// Stores the executor's handle, or uses it right away if the
    /// subscription already finished.
    fn attach(&self, handle: Box<dyn CancelHandle>) {
        let mut slot = self
            .cancel_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match self.state.load(Ordering::Acquire) {
            PENDING => *slot = Some(handle),
            CANCELLED => {
                drop(slot);
                handle.cancel();
            }
            _ => {}
        }
    }

    fn take_handle(&self) -> Option<Box<dyn CancelHandle>> {
        self.cancel_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// One in-flight call started by [`Bridge::subscribe`].
pub struct Subscription {
    shared: Arc<Shared>,
}

impl Subscription {
    /// Cancels the call if it has not delivered its terminal event yet.
    ///
    /// Suppresses every further event and asks the executor to abort. Does
    /// nothing after the terminal event or a previous cancellation.
    pub fn cancel(&self) {
        if self.shared.cancel() {
            tracing::debug!("call cancelled");
        }
    }

    /// Returns `true` if [`cancel`](Self::cancel) took effect.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Returns `true` once the terminal event has been claimed for delivery.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == TERMINATED
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.shared.state.load(Ordering::Acquire) {
            PENDING => "pending",
            TERMINATED => "terminated",
            _ => "cancelled",
        };
        f.debug_struct("Subscription").field("state", &state).finish()
    }
}
