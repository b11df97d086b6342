//! Request descriptions with shared defaults.
//!
//! A [`Session`] holds an executor plus a base path and headers applied to
//! every request. Its verb methods return a [`Call`], which collects
//! per-request details and is finished by picking a projection:
//!
//! ```ignore
//! let session = Session::builder()
//!     .executor(SpawningExecutor::new(reqwest::Client::new()))
//!     .base_path("https://example.test".into_endpoint_url()?)
//!     .build();
//!
//! let body = session.get("/get")?.string().single().await?;
//! ```

use std::{collections::BTreeMap, sync::Arc};

use bon::bon;
use bytes::Bytes;
use http::{
    HeaderMap, HeaderName, HeaderValue, Method,
    header::{CONTENT_TYPE, InvalidHeaderName, InvalidHeaderValue},
};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::{
    EndpointUrl,
    bridge::Bridge,
    deserialize::ResponseDeserializer,
    endpoint_url::EndpointUrlError,
    executor::RequestExecutor,
    projection::{
        BytesProjection, Exchange, FnProjection, ObjectProjection, Projection,
        ResponseObjectProjection, ResponseProjection, ResponseStringProjection, StringProjection,
        project_fn,
    },
    request::Request,
};

/// Settings for a [`Session`] that can be loaded with serde.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// The URL relative request paths are joined onto.
    #[serde(default)]
    pub base_path: Option<EndpointUrl>,
    /// Headers added to every request.
    #[serde(default)]
    pub base_headers: BTreeMap<String, String>,
}

/// Shared defaults for building bridged requests.
pub struct Session<X> {
    executor: Arc<X>,
    base_path: Option<EndpointUrl>,
    base_headers: HeaderMap,
}

impl<X> std::fmt::Debug for Session<X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_path", &self.base_path)
            .field("base_headers", &self.base_headers)
            .finish_non_exhaustive()
    }
}

impl<X> Clone for Session<X> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            base_path: self.base_path.clone(),
            base_headers: self.base_headers.clone(),
        }
    }
}

#[bon]
impl<X: RequestExecutor> Session<X> {
    /// Creates a session.
    #[builder]
    pub fn new(
        #[builder(into)] executor: Arc<X>,
        base_path: Option<EndpointUrl>,
        #[builder(default)] base_headers: HeaderMap,
    ) -> Self {
        Self {
            executor,
            base_path,
            base_headers,
        }
    }
}

impl<X: RequestExecutor> Session<X> {
    /// Creates a session from loaded settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured header name or value is invalid.
    pub fn from_config(
        executor: impl Into<Arc<X>>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let mut base_headers = HeaderMap::with_capacity(config.base_headers.len());
        for (name, value) in &config.base_headers {
            let (name, value) = parse_header(name, value)?;
            base_headers.append(name, value);
        }

        Ok(Self::builder()
            .executor(executor)
            .maybe_base_path(config.base_path)
            .base_headers(base_headers)
            .build())
    }

    /// Returns the executor shared by this session's bridges.
    #[must_use]
    pub fn executor(&self) -> &Arc<X> {
        &self.executor
    }

    /// Returns the base path, if any.
    #[must_use]
    pub fn base_path(&self) -> Option<&EndpointUrl> {
        self.base_path.as_ref()
    }

    /// Starts describing a request.
    ///
    /// `path` is used as-is if it carries a scheme, and is otherwise joined
    /// onto the base path.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built.
    pub fn request(&self, method: Method, path: &str) -> Result<Call<X>, SessionError> {
        let url =
            EndpointUrl::resolve(self.base_path.as_ref(), path).context(UrlSnafu { path })?;

        Ok(Call {
            executor: Arc::clone(&self.executor),
            request: Request::builder()
                .method(method)
                .url(url)
                .headers(self.base_headers.clone())
                .build(),
        })
    }

    /// Starts describing a `GET` request.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built.
    pub fn get(&self, path: &str) -> Result<Call<X>, SessionError> {
        self.request(Method::GET, path)
    }

    /// Starts describing a `POST` request.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built.
    pub fn post(&self, path: &str) -> Result<Call<X>, SessionError> {
        self.request(Method::POST, path)
    }

    /// Starts describing a `PUT` request.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built.
    pub fn put(&self, path: &str) -> Result<Call<X>, SessionError> {
        self.request(Method::PUT, path)
    }

    /// Starts describing a `PATCH` request.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built.
    pub fn patch(&self, path: &str) -> Result<Call<X>, SessionError> {
        self.request(Method::PATCH, path)
    }

    /// Starts describing a `DELETE` request.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built.
    pub fn delete(&self, path: &str) -> Result<Call<X>, SessionError> {
        self.request(Method::DELETE, path)
    }

    /// Starts describing a `HEAD` request.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built.
    pub fn head(&self, path: &str) -> Result<Call<X>, SessionError> {
        self.request(Method::HEAD, path)
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), SessionError> {
    let header_name = HeaderName::try_from(name).context(HeaderNameSnafu { name })?;
    let header_value = HeaderValue::try_from(value).context(HeaderValueSnafu { name })?;
    Ok((header_name, header_value))
}

/// A request being described, finished by choosing a projection.
pub struct Call<X> {
    executor: Arc<X>,
    request: Request,
}

impl<X> std::fmt::Debug for Call<X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

impl<X: RequestExecutor> Call<X> {
    /// Returns the request described so far.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Sets a header, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is invalid.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, SessionError> {
        let (name, value) = parse_header(name, value)?;
        self.request.headers_mut().insert(name, value);
        Ok(self)
    }

    /// Appends form-url-encoded query parameters to the URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` cannot be encoded.
    pub fn query<Q: Serialize + ?Sized>(mut self, params: &Q) -> Result<Self, SessionError> {
        let encoded = serde_html_form::to_string(params).context(EncodeQuerySnafu)?;
        let url = self
            .request
            .url()
            .with_query(&encoded)
            .context(UrlSnafu { path: encoded })?;
        self.request.set_url(url);
        Ok(self)
    }

    /// Sets a raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.set_body(body.into());
        self
    }

    /// Sets a JSON body and the matching `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, SessionError> {
        let encoded = serde_json::to_vec(body).context(EncodeJsonSnafu)?;
        self.request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self.body(encoded))
    }

    /// Sets a form-url-encoded body and the matching `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be encoded.
    pub fn form<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, SessionError> {
        let encoded = serde_html_form::to_string(body).context(EncodeFormSnafu)?;
        self.request.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        Ok(self.body(encoded))
    }

    /// Finishes with any projection.
    pub fn bridge<P: Projection>(self, projection: P) -> Bridge<X, P> {
        Bridge::new(self.executor, self.request, projection)
    }

    /// Emits the raw response and the body.
    pub fn response(self) -> Bridge<X, ResponseProjection> {
        self.bridge(ResponseProjection)
    }

    /// Emits the raw response and the body as text.
    pub fn response_string(self) -> Bridge<X, ResponseStringProjection> {
        self.bridge(ResponseStringProjection)
    }

    /// Emits the body as text.
    pub fn string(self) -> Bridge<X, StringProjection> {
        self.bridge(StringProjection)
    }

    /// Emits the body bytes.
    pub fn bytes(self) -> Bridge<X, BytesProjection> {
        self.bridge(BytesProjection)
    }

    /// Emits the raw response and the body deserialized by `deserializer`.
    pub fn response_object<D: ResponseDeserializer>(
        self,
        deserializer: D,
    ) -> Bridge<X, ResponseObjectProjection<D>> {
        self.bridge(ResponseObjectProjection::new(deserializer))
    }

    /// Emits the body deserialized by `deserializer`.
    pub fn object<D: ResponseDeserializer>(
        self,
        deserializer: D,
    ) -> Bridge<X, ObjectProjection<D>> {
        self.bridge(ObjectProjection::new(deserializer))
    }

    /// Emits whatever `f` builds from the finished [`Exchange`].
    pub fn project<F, T>(self, f: F) -> Bridge<X, FnProjection<F>>
    where
        F: Fn(Exchange) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        self.bridge(project_fn(f))
    }
}

/// Errors when describing a request.
#[derive(Debug, Snafu)]
pub enum SessionError {
    /// The request URL could not be built.
    #[snafu(display("Invalid request URL for {path:?}"))]
    Url {
        /// The path or query that was being applied.
        path: String,
        /// The underlying error.
        source: EndpointUrlError,
    },
    /// A header name was invalid.
    #[snafu(display("Invalid header name {name:?}"))]
    HeaderName {
        /// The rejected name.
        name: String,
        /// The underlying error.
        source: InvalidHeaderName,
    },
    /// A header value was invalid.
    #[snafu(display("Invalid value for header {name:?}"))]
    HeaderValue {
        /// The header name.
        name: String,
        /// The underlying error.
        source: InvalidHeaderValue,
    },
    /// The query parameters could not be encoded.
    #[snafu(display("Failed to encode query parameters"))]
    EncodeQuery {
        /// The underlying error.
        source: serde_html_form::ser::Error,
    },
    /// The form body could not be encoded.
    #[snafu(display("Failed to encode form body"))]
    EncodeForm {
        /// The underlying error.
        source: serde_html_form::ser::Error,
    },
    /// The JSON body could not be serialized.
    #[snafu(display("Failed to serialize JSON body"))]
    EncodeJson {
        /// The underlying error.
        source: serde_json::Error,
    },
}
