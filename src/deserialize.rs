//! Response body deserializers.
//!
//! A [`ResponseDeserializer`] turns a successful body into a typed value. Its
//! error type is preserved untouched in
//! [`RequestError::Deserialize`](crate::outcome::RequestError::Deserialize),
//! so callers can match on exactly what the deserializer reported.

use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;

/// Converts a response body into a typed value.
pub trait ResponseDeserializer: Send + Sync + 'static {
    /// The deserialized value.
    type Output: Send + 'static;

    /// The error returned for a body that cannot be deserialized.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Deserializes `body`.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if the body is malformed.
    fn deserialize(&self, body: Bytes) -> Result<Self::Output, Self::Error>;
}

/// Deserializes JSON bodies with `serde_json`.
pub struct Json<T>(PhantomData<fn() -> T>);

impl<T> Json<T> {
    /// Creates a JSON deserializer for `T`.
    #[must_use]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Json<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Json")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

impl<T: DeserializeOwned + Send + 'static> ResponseDeserializer for Json<T> {
    type Output = T;
    type Error = serde_json::Error;

    fn deserialize(&self, body: Bytes) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&body)
    }
}

/// A deserializer over raw body bytes. See [`deserialize_fn`].
#[derive(Debug, Clone)]
pub struct FnDeserializer<F>(F);

/// Builds a deserializer from a closure over the raw body.
pub fn deserialize_fn<F, T, E>(f: F) -> FnDeserializer<F>
where
    F: Fn(Bytes) -> Result<T, E> + Send + Sync + 'static,
{
    FnDeserializer(f)
}

impl<F, T, E> ResponseDeserializer for FnDeserializer<F>
where
    F: Fn(Bytes) -> Result<T, E> + Send + Sync + 'static,
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Output = T;
    type Error = E;

    fn deserialize(&self, body: Bytes) -> Result<T, E> {
        (self.0)(body)
    }
}

/// A deserializer over the body as text. See [`deserialize_text`].
#[derive(Debug, Clone)]
pub struct TextDeserializer<F>(F);

/// Builds a deserializer from a closure over the body decoded as UTF-8.
///
/// Invalid sequences are replaced with `U+FFFD`.
pub fn deserialize_text<F, T, E>(f: F) -> TextDeserializer<F>
where
    F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
{
    TextDeserializer(f)
}

impl<F, T, E> ResponseDeserializer for TextDeserializer<F>
where
    F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Output = T;
    type Error = E;

    fn deserialize(&self, body: Bytes) -> Result<T, E> {
        (self.0)(&String::from_utf8_lossy(&body))
    }
}
