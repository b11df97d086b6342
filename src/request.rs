//! Request descriptions.
//!
//! A [`Request`] describes a call without performing it. Bridges hold one
//! and hand a clone to the executor for every subscription.

use bon::Builder;
use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::EndpointUrl;

/// A description of an HTTP request.
#[derive(Debug, Clone, Builder)]
pub struct Request {
    /// The request method.
    #[builder(default = Method::GET)]
    method: Method,
    /// The absolute request URL.
    url: EndpointUrl,
    /// The request headers.
    #[builder(default)]
    headers: HeaderMap,
    /// The request body.
    #[builder(into, default)]
    body: Bytes,
}

impl Request {
    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URL.
    #[must_use]
    pub fn url(&self) -> &EndpointUrl {
        &self.url
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a mutable reference to the request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub(crate) fn set_url(&mut self, url: EndpointUrl) {
        self.url = url;
    }

    pub(crate) fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Converts the description into an [`http::Request`] for a transport.
    #[must_use]
    pub fn to_http(&self) -> http::Request<Bytes> {
        let (mut parts, ()) = http::Request::new(()).into_parts();
        parts.method = self.method.clone();
        parts.uri = self.url.as_uri().clone();
        parts.headers = self.headers.clone();
        http::Request::from_parts(parts, self.body.clone())
    }
}
