#![cfg(feature = "http-client-reqwest-0_13")]

use std::{
    net::SocketAddr,
    time::Duration,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, header::USER_AGENT};
use httpbridge::{
    IntoEndpointUrl as _, RequestError, Session,
    bridge::Recorder,
    deserialize::{Json, deserialize_fn, deserialize_text},
    executor::SpawningExecutor,
};
use serde::Deserialize;
use snafu::Snafu;
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::{TcpListener, TcpStream},
};

#[derive(Debug, Snafu, PartialEq)]
#[snafu(display("Malformed data"))]
struct Malformed;

#[derive(Debug, Deserialize)]
struct UserAgent {
    #[serde(rename = "user-agent")]
    user_agent: String,
}

type TestSession = Session<SpawningExecutor<reqwest::Client>>;

struct Server {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl Server {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        tokio::spawn(serve(listener, Arc::clone(&hits)));
        Self { addr, hits }
    }

    fn session(&self) -> TestSession {
        session_for(&format!("http://{}", self.addr))
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn session_for(base: &str) -> TestSession {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let mut base_headers = HeaderMap::new();
    base_headers.insert(USER_AGENT, HeaderValue::from_static("httpbridge-tests"));

    Session::builder()
        .executor(SpawningExecutor::new(client))
        .base_path(base.into_endpoint_url().unwrap())
        .base_headers(base_headers)
        .build()
}

async fn serve(listener: TcpListener, hits: Arc<AtomicUsize>) {
    while let Ok((stream, _)) = listener.accept().await {
        hits.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(handle(stream));
    }
}

async fn handle(mut stream: TcpStream) {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
        }
    }

    let head = String::from_utf8_lossy(&head);
    let path = head.split_whitespace().nth(1).unwrap_or("/");
    let user_agent = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("user-agent"))
        .map_or("", |(_, value)| value.trim());

    if path == "/hang" {
        // Hold the connection open without answering until the client goes away.
        while let Ok(n) = stream.read(&mut chunk).await {
            if n == 0 {
                break;
            }
        }
        return;
    }

    let (status, body) = route(path, user_agent);
    let preamble = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(preamble.as_bytes()).await;
    let _ = stream.write_all(&body).await;
    let _ = stream.shutdown().await;
}

fn route(path: &str, user_agent: &str) -> (&'static str, Vec<u8>) {
    if path == "/get" {
        return ("200 OK", b"ok".to_vec());
    }
    if path == "/user-agent" {
        let body = serde_json::json!({ "user-agent": user_agent });
        return ("200 OK", body.to_string().into_bytes());
    }
    if let Some(len) = path.strip_prefix("/bytes/").and_then(|n| n.parse().ok()) {
        return ("200 OK", vec![0xAB; len]);
    }
    ("404 Not Found", b"not found".to_vec())
}

#[tokio::test]
async fn test_string_success() {
    let server = Server::start().await;

    let outcome = server.session().get("/get").unwrap().string().single().await.unwrap();

    assert_eq!(outcome.unwrap(), "ok");
}

#[tokio::test]
async fn test_string_not_found_is_a_value() {
    let server = Server::start().await;

    let outcome = server.session().get("/gt").unwrap().string().single().await;

    let err = outcome.expect("no stream fault").unwrap_err();
    assert!(err.to_string().contains("404"), "{err}");
    assert_eq!(
        err.transport().and_then(|source| source.status()),
        Some(StatusCode::NOT_FOUND)
    );
}

#[tokio::test]
async fn test_bytes_length() {
    let server = Server::start().await;

    let bytes = server
        .session()
        .get("/bytes/555")
        .unwrap()
        .bytes()
        .single()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(bytes.len(), 555);
}

#[tokio::test]
async fn test_response_and_response_string() {
    let server = Server::start().await;
    let session = server.session();

    let (response, body) = session.get("/get").unwrap().response().single().await.unwrap();
    assert_eq!(response.status(), Some(StatusCode::OK));
    assert_eq!(response.content_length(), Some(2));
    assert_eq!(body.unwrap(), Bytes::from_static(b"ok"));

    let (response, text) = session
        .get("/get")
        .unwrap()
        .response_string()
        .single()
        .await
        .unwrap();
    assert_eq!(response.url().to_string(), format!("http://{}/get", server.addr));
    assert_eq!(text.unwrap(), "ok");
}

#[tokio::test]
async fn test_response_object_json() {
    let server = Server::start().await;

    let (response, outcome) = server
        .session()
        .get("user-agent")
        .unwrap()
        .response_object(Json::<UserAgent>::new())
        .single()
        .await
        .unwrap();

    assert_eq!(response.status(), Some(StatusCode::OK));
    assert_eq!(outcome.unwrap().user_agent, "httpbridge-tests");
}

#[tokio::test]
async fn test_response_object_not_found() {
    let server = Server::start().await;

    let (response, outcome) = server
        .session()
        .get("/useragent")
        .unwrap()
        .response_object(deserialize_text(|text| Ok::<_, Malformed>(text.to_string())))
        .single()
        .await
        .unwrap();

    assert_eq!(response.status(), Some(StatusCode::NOT_FOUND));
    assert!(matches!(outcome, Err(RequestError::Transport { .. })));
}

#[tokio::test]
async fn test_response_object_malformed_keeps_error() {
    let server = Server::start().await;

    let (response, outcome) = server
        .session()
        .get("/user-agent")
        .unwrap()
        .response_object(deserialize_fn(|_: Bytes| Err::<UserAgent, _>(Malformed)))
        .single()
        .await
        .unwrap();

    assert_eq!(response.status(), Some(StatusCode::OK));
    let err = outcome.unwrap_err();
    assert_eq!(err.deserialize(), Some(&Malformed));
    assert_eq!(err.deserialize().unwrap().to_string(), "Malformed data");
}

#[tokio::test]
async fn test_project_sees_request_and_response() {
    let server = Server::start().await;

    let (method, status, agent) = server
        .session()
        .get("user-agent")
        .unwrap()
        .project(|exchange| {
            (
                exchange.request.method().clone(),
                exchange.response.status(),
                exchange.outcome.is_ok(),
            )
        })
        .single()
        .await
        .unwrap();

    assert_eq!(method, http::Method::GET);
    assert_eq!(status, Some(StatusCode::OK));
    assert!(agent);
}

#[tokio::test]
async fn test_connection_refused_is_a_value() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (response, outcome) = session_for(&format!("http://{addr}"))
        .get("/get")
        .unwrap()
        .response()
        .single()
        .await
        .expect("no stream fault");

    assert_eq!(response.status(), None);
    assert!(matches!(outcome, Err(RequestError::Transport { .. })));
}

#[tokio::test]
async fn test_resubscribing_calls_again() {
    let server = Server::start().await;
    let bridge = server.session().get("/get").unwrap().string();

    for _ in 0..2 {
        let recorder = Recorder::new();
        bridge.subscribe(recorder.clone());
        recorder.terminated().await;

        assert_eq!(recorder.error_count(), 0);
        assert!(recorder.is_complete());
        let values = recorder.take_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].as_deref().unwrap(), "ok");
    }

    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_failures_never_fault_the_stream() {
    let server = Server::start().await;
    let session = server.session();

    let ok = session.get("/get").unwrap().string().single().await;
    let missing = session.get("/missing").unwrap().string().single().await;

    assert!(matches!(ok, Ok(Ok(_))));
    assert!(matches!(missing, Ok(Err(_))));
}

#[tokio::test]
async fn test_cancel_in_flight_call_stays_silent() {
    let server = Server::start().await;
    let recorder = Recorder::new();

    let subscription = server
        .session()
        .get("/hang")
        .unwrap()
        .string()
        .subscribe(recorder.clone());

    while server.hits() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    subscription.cancel();
    assert!(subscription.is_cancelled());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(recorder.is_empty());
    assert!(!recorder.is_terminated());
}
