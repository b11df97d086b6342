//! HTTP client and response abstractions.
//!
//! These traits decouple the crate from any specific HTTP implementation.
//! Users provide their own [`HttpClient`] (e.g. backed by `reqwest` or
//! `hyper`) and hand it to a [`SpawningExecutor`], which turns its async
//! calls into the callback form the bridge consumes.
//!
//! [`SpawningExecutor`]: crate::executor::SpawningExecutor

#[cfg(feature = "http-client-reqwest-0_13")]
mod reqwest_0_13;

use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode};

/// Defines the common interface for HTTP requests.
pub trait HttpClient: Send + Sync + 'static {
    /// The error type returned by the client for a failed request.
    type Error: crate::Error;

    /// The associated response type returned by this HTTP client.
    type Response: HttpResponse;

    /// Executes an HTTP request and returns an owned response.
    ///
    /// # Arguments
    ///
    /// * `request`: The `http::Request` to be executed. The body is provided as `bytes::Bytes`.
    ///
    /// # Returns
    ///
    /// A `Future` that resolves to a `Result` containing the `Self::Response` on success,
    /// or `Self::Error` on failure.
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;
}

/// Defines the common interface for HTTP responses.
pub trait HttpResponse: Send + Sync {
    /// The error type when getting the response body.
    type Error: crate::Error;

    /// Returns the HTTP status code of the response.
    fn status(&self) -> StatusCode;

    /// Returns the response's HTTP headers.
    fn headers(&self) -> HeaderMap;

    /// Consumes the response and asynchronously returns its body as `bytes::Bytes`.
    fn body(self) -> impl Future<Output = Result<Bytes, Self::Error>> + Send;
}
