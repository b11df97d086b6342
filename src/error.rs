//! Error types and the [`Error`] trait.
//!
//! Transport errors surfaced by this crate implement the [`Error`] trait,
//! which extends [`std::error::Error`] with retry semantics. [`BoxedError`]
//! erases the concrete transport error while preserving retryability, so a
//! single [`TransportError`](crate::executor::TransportError) can carry the
//! failure of any [`HttpClient`](crate::http::HttpClient).

use std::convert::Infallible;

use snafu::{AsErrorSource, Snafu};

/// Errors that may be produced by a transport.
pub trait Error: std::error::Error + AsErrorSource + Send + Sync + 'static {
    /// If true, this indicates that a failed request may succeed if retried.
    fn is_retryable(&self) -> bool;
}

impl Error for Infallible {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// A boxed error that can be used without type parameters.
#[derive(Debug, Snafu)]
#[snafu(transparent)]
pub struct BoxedError {
    source: Box<dyn Error>,
}

impl BoxedError {
    /// Create a new boxed error from a generic `Error`.
    pub fn from_err<E: Error + 'static>(err: E) -> Self {
        Self {
            source: Box::new(err),
        }
    }

    /// Returns a reference to the inner error if it is of type `E`.
    #[must_use]
    pub fn downcast_ref<E: Error>(&self) -> Option<&E> {
        let inner: &dyn std::error::Error = self.source.as_ref();
        inner.downcast_ref::<E>()
    }
}

impl Error for BoxedError {
    fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}
