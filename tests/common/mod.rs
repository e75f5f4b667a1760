//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use rental_fetch::api::ApiClient;
use rental_fetch::config::ClientConfig;
use rental_fetch::resilience::{RawFailure, RetryPolicy};
use rental_fetch::transport::{CredentialProvider, Method, NoCredentials, Transport, TransportRequest, TransportResponse};

/// What the mock answers for a route.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, Value),
    Timeout,
    Network,
    /// The transport itself panics.
    Panic,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply::Status(200, body)
    }

    fn into_result(self) -> Result<TransportResponse, RawFailure> {
        match self {
            Reply::Status(status, body) => Ok(TransportResponse::new(status, body)),
            Reply::Timeout => Err(RawFailure::Timeout),
            Reply::Network => Err(RawFailure::Network("connection reset".into())),
            Reply::Panic => panic!("transport crashed"),
        }
    }
}

/// In-memory transport with scripted replies per path and a call log.
///
/// Each route holds a queue of replies; the last one repeats forever.
/// Unknown routes answer 404.
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    log: Mutex<Vec<TransportRequest>>,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    /// Every reply is delayed by `delay`, so concurrent callers overlap.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            delay,
        })
    }

    /// Replace the replies for `path` (relative to the API base, no query).
    pub fn script(&self, path: &str, replies: Vec<Reply>) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), replies.into_iter().collect());
    }

    pub fn respond(&self, path: &str, status: u16, body: Value) {
        self.script(path, vec![Reply::Status(status, body)]);
    }

    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && route_of(r) == path)
            .count()
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.log.lock().unwrap().clone()
    }

    fn next_reply(&self, path: &str) -> Reply {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Reply::Status(404, Value::Null)),
            None => Reply::Status(404, Value::Null),
        }
    }
}

/// Request path with the `/api` base prefix removed.
fn route_of(request: &TransportRequest) -> String {
    let path = request.url.path();
    path.strip_prefix("/api").unwrap_or(path).to_string()
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse, RawFailure> {
        let path = route_of(&request);
        self.log.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.next_reply(&path).into_result()
    }
}

/// Config pointing at a fake base URL with the file-backed protocol cache off.
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.api.base_url = "http://rental.test/api".into();
    config.protocol_cache.enabled = false;
    config
}

pub fn client(transport: Arc<MockTransport>) -> ApiClient {
    client_with(transport, RetryPolicy::default(), Arc::new(NoCredentials))
}

pub fn client_with(
    transport: Arc<MockTransport>,
    retry: RetryPolicy,
    credentials: Arc<dyn CredentialProvider>,
) -> ApiClient {
    ApiClient::builder(test_config())
        .transport(transport)
        .credentials(credentials)
        .retry_policy(retry)
        .build()
        .expect("client builds")
}

/// Start a programmable HTTP backend on an ephemeral port.
///
/// `f` receives the raw request head and returns status and body. Every
/// request head is also recorded in the returned log.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Arc<Mutex<Vec<String>>>)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let log = seen.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        let head = read_request(&mut socket).await;
                        log.lock().unwrap().push(head.clone());

                        let (status, body) = f(head).await;
                        let response = format!(
                            "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen)
}

/// Read the request head and discard any body announced by Content-Length.
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return String::from_utf8_lossy(&buf).into_owned(),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut remaining = content_length.saturating_sub(buf.len() - head_end);
    while remaining > 0 {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => remaining = remaining.saturating_sub(n),
        }
    }
    head
}
