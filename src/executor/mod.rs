//! Callback-driven request execution.
//!
//! A [`RequestExecutor`] starts a call and reports its end by invoking a
//! [`Completion`] exactly once, from whatever thread it likes. It returns a
//! [`CancelHandle`] the bridge uses to abort the call when a subscriber
//! cancels. [`SpawningExecutor`] adapts any async [`HttpClient`] to this
//! shape by running it on a tokio runtime.
//!
//! [`HttpClient`]: crate::http::HttpClient

mod spawn;

use bytes::Bytes;
use http::StatusCode;
use snafu::Snafu;

use crate::{BoxedError, request::Request, response::RawResponse};

pub use spawn::SpawningExecutor;

/// The outcome reported by a transport: the body, or why there is none.
pub type TransportOutcome = Result<Bytes, TransportError>;

/// Issues calls and reports each through a single [`Completion`].
pub trait RequestExecutor: Send + Sync + 'static {
    /// The handle returned for aborting an in-flight call.
    type CancelHandle: CancelHandle;

    /// Starts executing `request`.
    ///
    /// The executor must eventually call [`Completion::complete`] or drop the
    /// completion. It may do so before returning. Dropping the completion
    /// without completing it is reported to the subscriber as a fault,
    /// unless the subscriber has cancelled.
    fn execute(&self, request: Request, completion: Completion) -> Self::CancelHandle;
}

/// Aborts an in-flight call, on a best-effort basis.
pub trait CancelHandle: Send + 'static {
    /// Requests that the call be aborted.
    fn cancel(self: Box<Self>);
}

/// For executors that cannot abort a call once started.
impl CancelHandle for () {
    fn cancel(self: Box<Self>) {}
}

impl CancelHandle for tokio::task::AbortHandle {
    fn cancel(self: Box<Self>) {
        self.abort();
    }
}

impl<H: CancelHandle> CancelHandle for Option<H> {
    fn cancel(self: Box<Self>) {
        if let Some(handle) = *self {
            Box::new(handle).cancel();
        }
    }
}

type Callback = Box<dyn FnOnce(Option<(RawResponse, TransportOutcome)>) + Send>;

/// The one-shot callback through which an executor reports a finished call.
///
/// Consumed by [`complete`](Completion::complete). If it is dropped instead,
/// the bridge is told the call will never complete.
pub struct Completion {
    callback: Option<Callback>,
}

impl Completion {
    /// Wraps a callback. It receives `None` if the completion is dropped unused.
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Option<(RawResponse, TransportOutcome)>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Reports the finished call.
    pub fn complete(mut self, response: RawResponse, outcome: TransportOutcome) {
        if let Some(callback) = self.callback.take() {
            callback(Some((response, outcome)));
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(None);
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

/// Failures reported by a transport.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransportError {
    /// The HTTP request could not be made.
    #[snafu(display("Failed to make HTTP request: {source}"))]
    Request {
        /// The underlying client error.
        source: BoxedError,
    },
    /// The response body could not be read.
    #[snafu(display("Failed to read response body: {source}"))]
    ResponseBody {
        /// The underlying client error.
        source: BoxedError,
    },
    /// The server answered with a status outside the accepted range.
    #[snafu(display("HTTP request failed with status {status}"))]
    BadStatus {
        /// The received status.
        status: StatusCode,
        /// The received body.
        body: Bytes,
    },
    /// There was no tokio runtime to run the call on.
    #[snafu(display("No tokio runtime available to execute the request"))]
    NoRuntime,
}

impl TransportError {
    /// Returns the status code, if the server answered with a rejected status.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::BadStatus { status, .. } => Some(*status),
            Self::Request { .. } | Self::ResponseBody { .. } | Self::NoRuntime => None,
        }
    }
}

impl crate::Error for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Request { source } | Self::ResponseBody { source } => {
                crate::Error::is_retryable(source)
            }
            Self::BadStatus { status, .. } => status.is_server_error(),
            Self::NoRuntime => false,
        }
    }
}
