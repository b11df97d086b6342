use std::{ops::Range, sync::Arc};

use bon::Builder;
use bytes::Bytes;
use tokio::{runtime::Handle, task::AbortHandle};

use super::{BadStatusSnafu, Completion, RequestExecutor, TransportError, TransportOutcome};
use crate::{
    BoxedError,
    http::{HttpClient, HttpResponse},
    request::Request,
    response::RawResponse,
};

/// Runs an [`HttpClient`] on a tokio runtime and reports through a [`Completion`].
///
/// Each call is spawned as its own task; the returned cancel handle aborts
/// that task. Responses whose status falls outside `valid_status` are
/// reported as [`TransportError::BadStatus`].
#[derive(Debug, Builder)]
#[builder(state_mod(name = builder))]
pub struct SpawningExecutor<C: HttpClient> {
    /// The HTTP client that performs the calls.
    #[builder(into)]
    client: Arc<C>,
    /// Status codes treated as success.
    #[builder(default = 200..300)]
    valid_status: Range<u16>,
    /// The runtime to spawn on. Defaults to the runtime current at call time.
    runtime: Option<Handle>,
}

impl<C: HttpClient> SpawningExecutor<C> {
    /// Creates an executor with default settings.
    pub fn new(client: C) -> Self {
        Self::builder().client(Arc::new(client)).build()
    }

    /// Returns the underlying HTTP client.
    #[must_use]
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }
}

impl<C: HttpClient> RequestExecutor for SpawningExecutor<C> {
    type CancelHandle = Option<AbortHandle>;

    fn execute(&self, request: Request, completion: Completion) -> Self::CancelHandle {
        let runtime = match self.runtime.clone().map_or_else(Handle::try_current, Ok) {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(url = %request.url(), "no tokio runtime for request");
                completion.complete(
                    RawResponse::empty(request.url().clone()),
                    Err(TransportError::NoRuntime),
                );
                return None;
            }
        };

        let client = Arc::clone(&self.client);
        let valid_status = self.valid_status.clone();
        let task = runtime.spawn(async move {
            let (response, outcome) = perform(client.as_ref(), &request, &valid_status).await;
            completion.complete(response, outcome);
        });

        Some(task.abort_handle())
    }
}

async fn perform<C: HttpClient>(
    client: &C,
    request: &Request,
    valid_status: &Range<u16>,
) -> (RawResponse, TransportOutcome) {
    let url = request.url().clone();

    let response = match client.execute(request.to_http()).await {
        Ok(response) => response,
        Err(source) => {
            tracing::debug!(%url, error = %source, "request failed");
            return (
                RawResponse::empty(url),
                Err(TransportError::Request {
                    source: BoxedError::from_err(source),
                }),
            );
        }
    };

    let status = response.status();
    let headers = response.headers();
    let body = match response.body().await {
        Ok(body) => body,
        Err(source) => {
            tracing::debug!(%url, %status, error = %source, "failed to read response body");
            return (
                RawResponse::new(url, status, headers, Bytes::new()),
                Err(TransportError::ResponseBody {
                    source: BoxedError::from_err(source),
                }),
            );
        }
    };

    tracing::trace!(%url, %status, len = body.len(), "response received");
    let raw = RawResponse::new(url, status, headers, body.clone());

    let outcome = if valid_status.contains(&status.as_u16()) {
        Ok(body)
    } else {
        BadStatusSnafu { status, body }.fail()
    };

    (raw, outcome)
}
