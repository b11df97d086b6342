use std::sync::LazyLock;

use super::{HttpClient, HttpResponse};

use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode};

async fn send(
    client: &reqwest::Client,
    request: Request<Bytes>,
) -> reqwest::Result<reqwest::Response> {
    let (parts, body) = request.into_parts();
    let reqwest_request = client
        .request(parts.method, parts.uri.to_string())
        .headers(parts.headers)
        .body(body)
        .build()?;

    client.execute(reqwest_request).await
}

impl HttpClient for reqwest::Client {
    type Response = reqwest::Response;
    type Error = reqwest::Error;

    /// Converts the `http::Request<Bytes>` into a `reqwest::Request` and sends it.
    async fn execute(&self, request: Request<Bytes>) -> Result<Self::Response, Self::Error> {
        send(self, request).await
    }
}

/// Allows a lazily-initialised global client to be shared by executors.
impl HttpClient for LazyLock<reqwest::Client> {
    type Response = reqwest::Response;
    type Error = reqwest::Error;

    async fn execute(&self, request: Request<Bytes>) -> Result<Self::Response, Self::Error> {
        send(self, request).await
    }
}

impl HttpResponse for reqwest::Response {
    type Error = reqwest::Error;

    fn status(&self) -> StatusCode {
        self.status()
    }

    fn headers(&self) -> HeaderMap {
        self.headers().clone()
    }

    /// Reads the full body through `reqwest::Response::bytes()`.
    async fn body(self) -> Result<Bytes, Self::Error> {
        self.bytes().await
    }
}

impl crate::Error for reqwest::Error {
    fn is_retryable(&self) -> bool {
        self.is_connect() || self.is_timeout()
    }
}
