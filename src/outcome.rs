//! The payload of a completed call.
//!
//! Every bridge emits an [`Outcome`]: `Ok` with the projected value, or `Err`
//! with a [`RequestError`] describing why the request failed. Request
//! failures are ordinary values here; they never travel on a stream's own
//! error channel.

use std::convert::Infallible;

use snafu::Snafu;

use crate::executor::TransportError;

/// The result of one request, as delivered by a bridge.
///
/// `E` is the error type of the deserializer, if any.
pub type Outcome<T, E = Infallible> = Result<T, RequestError<E>>;

/// Why a request failed.
#[derive(Debug, Snafu)]
pub enum RequestError<E: std::error::Error + 'static> {
    /// The transport failed, or the server answered with a rejected status.
    #[snafu(display("Transport failure: {source}"))]
    Transport {
        /// The underlying transport error.
        source: TransportError,
    },
    /// The deserializer rejected the body.
    #[snafu(display("Failed to deserialize response body: {source}"))]
    Deserialize {
        /// The error returned by the deserializer, unchanged.
        source: E,
    },
    /// The deserializer panicked.
    #[snafu(display("Response deserializer panicked: {message}"))]
    DeserializerPanicked {
        /// The panic message, if it was a string.
        message: String,
    },
}

impl<E: std::error::Error + 'static> RequestError<E> {
    /// Returns the transport error, if this is a transport failure.
    #[must_use]
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport { source } => Some(source),
            Self::Deserialize { .. } | Self::DeserializerPanicked { .. } => None,
        }
    }

    /// Returns the deserializer's error, if deserialization failed.
    #[must_use]
    pub fn deserialize(&self) -> Option<&E> {
        match self {
            Self::Deserialize { source } => Some(source),
            Self::Transport { .. } | Self::DeserializerPanicked { .. } => None,
        }
    }
}

impl<E: std::error::Error + Send + Sync + 'static> crate::Error for RequestError<E> {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { source } => crate::Error::is_retryable(source),
            Self::Deserialize { .. } | Self::DeserializerPanicked { .. } => false,
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
