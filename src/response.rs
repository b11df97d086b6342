//! What the transport saw of a finished call.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::EndpointUrl;

/// Transport-level metadata of a completed call.
///
/// When the transport failed before any response arrived, the status is
/// absent and the headers and body are empty.
#[derive(Debug, Clone)]
pub struct RawResponse {
    url: EndpointUrl,
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Bytes,
}

impl RawResponse {
    /// Creates a response received from the server.
    #[must_use]
    pub fn new(url: EndpointUrl, status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            url,
            status: Some(status),
            headers,
            body,
        }
    }

    /// Creates a response standing in for a call that never got one.
    #[must_use]
    pub fn empty(url: EndpointUrl) -> Self {
        Self {
            url,
            status: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// The URL the request was sent to.
    #[must_use]
    pub fn url(&self) -> &EndpointUrl {
        &self.url
    }

    /// The HTTP status code, if a response was received.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The response body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The declared `Content-Length`, if present and valid.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(http::header::CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .parse()
            .ok()
    }
}
