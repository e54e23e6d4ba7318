//! In-process client for driving an [`Application`] without sockets.
//!
//! ```rust,ignore
//! let client = TestClient::new(Arc::new(app));
//! let resp = client.get("/users/42").await;
//! assert_eq!(resp.status, StatusCode::OK);
//! assert_eq!(resp.json(), json!({ "id": 42 }));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::app::Application;
use crate::gateway::{GatewayError, Message, Receiver, Scope, Sender};

/// Client address reported in test scopes.
const TEST_CLIENT: ([u8; 4], u16) = ([127, 0, 0, 1], 50_000);

/// A request to send through [`TestClient::request`].
#[derive(Clone, Debug)]
pub struct TestRequest {
    method: String,
    /// Path with optional `?query`.
    target: String,
    headers: Vec<(String, String)>,
    chunks: Vec<Bytes>,
}

impl TestRequest {
    pub fn new(method: &str, target: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            target: target.to_string(),
            headers: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Body delivered as a single chunk.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.chunks = vec![body.into()];
        self
    }

    /// Body delivered as several `http.request` messages.
    pub fn chunks<I, B>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// JSON body with a matching content type.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(self.header("content-type", "application/json").body(body))
    }

    fn scope(&self) -> Scope {
        let (path, query) = match self.target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (self.target.as_str(), ""),
        };

        let mut scope = Scope::http(self.method.as_str(), path)
            .with_query(Bytes::copy_from_slice(query.as_bytes()))
            .with_client(SocketAddr::from(TEST_CLIENT));
        for (name, value) in &self.headers {
            scope = scope.with_header(name, Bytes::copy_from_slice(value.as_bytes()));
        }
        scope
    }

    /// Receiver preloaded with the body, then disconnected.
    fn receiver(&self) -> Receiver {
        let (tx, rx) = mpsc::channel(self.chunks.len().max(1));
        if self.chunks.is_empty() {
            let _ = tx.try_send(Message::Request {
                body: Bytes::new(),
                more_body: false,
            });
        }
        let last = self.chunks.len().saturating_sub(1);
        for (i, chunk) in self.chunks.iter().enumerate() {
            let _ = tx.try_send(Message::Request {
                body: chunk.clone(),
                more_body: i < last,
            });
        }
        Receiver::channel(rx)
    }
}

/// A collected response.
#[derive(Clone, Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    /// Header entries in the order they were sent, names lowercased.
    pub headers: Vec<(String, String)>,
    /// All body chunks concatenated.
    pub body: Bytes,
    /// Number of non-empty body messages.
    pub chunks: usize,
}

impl TestResponse {
    /// First value of `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as JSON; `Value::Null` if it does not parse.
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Drives an [`Application`] in process.
#[derive(Clone, Debug)]
pub struct TestClient {
    app: Arc<Application>,
}

impl TestClient {
    pub fn new(app: Arc<Application>) -> Self {
        Self { app }
    }

    pub async fn get(&self, target: &str) -> TestResponse {
        self.request(TestRequest::new("GET", target)).await
    }

    /// POST `value` as JSON.
    ///
    /// # Panics
    ///
    /// If `value` cannot be serialized, or as [`TestClient::request`].
    pub async fn post_json<T: Serialize + ?Sized>(&self, target: &str, value: &T) -> TestResponse {
        match TestRequest::new("POST", target).json(value) {
            Ok(req) => self.request(req).await,
            Err(e) => panic!("test body does not serialize: {}", e),
        }
    }

    /// Send `chunks` as a streamed request body.
    pub async fn request_chunked(&self, method: &str, target: &str, chunks: Vec<Bytes>) -> TestResponse {
        self.request(TestRequest::new(method, target).chunks(chunks))
            .await
    }

    /// Run one exchange.
    ///
    /// # Panics
    ///
    /// If the exchange breaks the response protocol; use
    /// [`TestClient::try_request`] to inspect the error instead.
    pub async fn request(&self, req: TestRequest) -> TestResponse {
        match self.try_request(req).await {
            Ok(resp) => resp,
            Err(e) => panic!("exchange failed: {}", e),
        }
    }

    /// Run one exchange and collect the response.
    pub async fn try_request(&self, req: TestRequest) -> Result<TestResponse, GatewayError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let send = Sender::from_fn(move |msg| {
            let result = tx.send(msg).map_err(|_| GatewayError::Closed);
            async move { result }
        });

        self.app.call(req.scope(), req.receiver(), send).await?;
        rx.close();

        let mut start = None;
        let mut body = BytesMut::new();
        let mut chunks = 0;
        let mut finished = false;

        while let Some(msg) = rx.recv().await {
            match msg {
                Message::ResponseStart { status, headers } if start.is_none() => {
                    let headers: Vec<(String, String)> = headers
                        .iter()
                        .map(|(n, v)| {
                            (
                                String::from_utf8_lossy(n).to_ascii_lowercase(),
                                String::from_utf8_lossy(v).into_owned(),
                            )
                        })
                        .collect();
                    start = Some((status, headers));
                }
                Message::ResponseBody { body: chunk, more_body } if start.is_some() && !finished => {
                    if !chunk.is_empty() {
                        chunks += 1;
                        body.extend_from_slice(&chunk);
                    }
                    finished = !more_body;
                }
                other => {
                    return Err(GatewayError::Protocol(format!("unexpected {}", other.kind())));
                }
            }
        }

        let (status, headers) =
            start.ok_or_else(|| GatewayError::Protocol("no response start".into()))?;
        Ok(TestResponse {
            status,
            headers,
            body: body.freeze(),
            chunks,
        })
    }

    /// Run the startup/shutdown handshake.
    pub async fn lifespan(&self) -> Result<(), GatewayError> {
        let (in_tx, in_rx) = mpsc::channel(2);
        let (out_tx, mut out_rx) = mpsc::channel(2);

        in_tx
            .send(Message::Startup)
            .await
            .map_err(|_| GatewayError::Closed)?;
        in_tx
            .send(Message::Shutdown)
            .await
            .map_err(|_| GatewayError::Closed)?;

        self.app
            .call(Scope::lifespan(), Receiver::channel(in_rx), Sender::channel(out_tx))
            .await?;

        let replies = [out_rx.recv().await, out_rx.recv().await];
        match replies {
            [Some(Message::StartupComplete), Some(Message::ShutdownComplete)] => Ok(()),
            other => Err(GatewayError::Protocol(format!(
                "unexpected lifespan replies {:?}",
                other.iter().map(|m| m.as_ref().map(Message::kind)).collect::<Vec<_>>()
            ))),
        }
    }
}
