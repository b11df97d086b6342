//! Views of a completed call.
//!
//! A [`Projection`] turns the [`Exchange`] reported by the executor into the
//! item a bridge emits. The built-in projections keep request failures in
//! the payload as an [`Outcome`]; none of them can fail the stream itself.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use bytes::Bytes;

use crate::{
    deserialize::ResponseDeserializer,
    executor::TransportOutcome,
    outcome::{Outcome, RequestError, panic_message},
    request::Request,
    response::RawResponse,
};

/// Everything known about a finished call.
#[derive(Debug)]
pub struct Exchange {
    /// The request that was sent.
    pub request: Request,
    /// The transport's view of the response.
    pub response: RawResponse,
    /// The body, or the transport failure.
    pub outcome: TransportOutcome,
}

impl Exchange {
    fn into_outcome(self) -> (RawResponse, Outcome<Bytes>) {
        let outcome = self
            .outcome
            .map_err(|source| RequestError::Transport { source });
        (self.response, outcome)
    }
}

/// Builds the item a bridge emits from a finished call.
pub trait Projection: Send + Sync + 'static {
    /// The emitted item.
    type Item: Send + 'static;

    /// Projects `exchange` into an item.
    fn project(&self, exchange: Exchange) -> Self::Item;
}

/// Emits the raw response together with the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseProjection;

impl Projection for ResponseProjection {
    type Item = (RawResponse, Outcome<Bytes>);

    fn project(&self, exchange: Exchange) -> Self::Item {
        exchange.into_outcome()
    }
}

/// Emits the body bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesProjection;

impl Projection for BytesProjection {
    type Item = Outcome<Bytes>;

    fn project(&self, exchange: Exchange) -> Self::Item {
        exchange.into_outcome().1
    }
}

/// Emits the body decoded as UTF-8, replacing invalid sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringProjection;

impl Projection for StringProjection {
    type Item = Outcome<String>;

    fn project(&self, exchange: Exchange) -> Self::Item {
        exchange.into_outcome().1.map(decode)
    }
}

/// Emits the raw response together with the body decoded as UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseStringProjection;

impl Projection for ResponseStringProjection {
    type Item = (RawResponse, Outcome<String>);

    fn project(&self, exchange: Exchange) -> Self::Item {
        let (response, outcome) = exchange.into_outcome();
        (response, outcome.map(decode))
    }
}

fn decode(body: Bytes) -> String {
    String::from_utf8_lossy(&body).into_owned()
}

/// Emits the raw response together with the deserialized body.
#[derive(Debug)]
pub struct ResponseObjectProjection<D> {
    deserializer: Arc<D>,
}

impl<D> ResponseObjectProjection<D> {
    /// Creates a projection using `deserializer`.
    pub fn new(deserializer: D) -> Self {
        Self {
            deserializer: Arc::new(deserializer),
        }
    }
}

impl<D> Clone for ResponseObjectProjection<D> {
    fn clone(&self) -> Self {
        Self {
            deserializer: Arc::clone(&self.deserializer),
        }
    }
}

impl<D: ResponseDeserializer> Projection for ResponseObjectProjection<D> {
    type Item = (RawResponse, Outcome<D::Output, D::Error>);

    fn project(&self, exchange: Exchange) -> Self::Item {
        let response = exchange.response;
        let outcome = match exchange.outcome {
            Ok(body) => run_deserializer(self.deserializer.as_ref(), body),
            Err(source) => Err(RequestError::Transport { source }),
        };
        (response, outcome)
    }
}

/// Emits the deserialized body.
#[derive(Debug)]
pub struct ObjectProjection<D> {
    inner: ResponseObjectProjection<D>,
}

impl<D> ObjectProjection<D> {
    /// Creates a projection using `deserializer`.
    pub fn new(deserializer: D) -> Self {
        Self {
            inner: ResponseObjectProjection::new(deserializer),
        }
    }
}

impl<D> Clone for ObjectProjection<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: ResponseDeserializer> Projection for ObjectProjection<D> {
    type Item = Outcome<D::Output, D::Error>;

    fn project(&self, exchange: Exchange) -> Self::Item {
        self.inner.project(exchange).1
    }
}

fn run_deserializer<D: ResponseDeserializer>(
    deserializer: &D,
    body: Bytes,
) -> Outcome<D::Output, D::Error> {
    match catch_unwind(AssertUnwindSafe(|| deserializer.deserialize(body))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(RequestError::Deserialize { source }),
        Err(payload) => Err(RequestError::DeserializerPanicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// A projection built from a closure. See [`project_fn`].
#[derive(Debug, Clone)]
pub struct FnProjection<F>(F);

/// Builds a projection from a closure over the whole [`Exchange`].
pub fn project_fn<F, T>(f: F) -> FnProjection<F>
where
    F: Fn(Exchange) -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    FnProjection(f)
}

impl<F, T> Projection for FnProjection<F>
where
    F: Fn(Exchange) -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    type Item = T;

    fn project(&self, exchange: Exchange) -> T {
        (self.0)(exchange)
    }
}
