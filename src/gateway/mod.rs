//! Async server gateway boundary.
//!
//! An application is a callable taking one exchange: a [`Scope`] describing
//! the connection, a [`Receiver`] yielding inbound messages and a [`Sender`]
//! accepting outbound messages. Transports (the hyper adapter in
//! [`crate::server`], the in-process [`crate::testing::TestClient`]) speak this
//! interface; the application never sees sockets.
//!
//! # Message flow
//!
//! ```text
//! transport ──Request{body,more_body}──▶ app
//! transport ◀──ResponseStart{status,headers}── app   (exactly once)
//! transport ◀──ResponseBody{body,more_body}── app    (one or more)
//! ```

pub mod lifespan;

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::StatusCode;
use tokio::sync::{mpsc, Mutex};

/// Ordered list of raw header entries, as they travel over the boundary.
pub type HeaderList = Vec<(Bytes, Bytes)>;

/// Kind of exchange a scope describes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// A single HTTP request/response exchange.
    Http,
    /// Process lifecycle (startup/shutdown) handshake.
    Lifespan,
    /// Any protocol the application does not serve (e.g. websocket).
    Other(String),
}

impl ScopeKind {
    pub fn as_str(&self) -> &str {
        match self {
            ScopeKind::Http => "http",
            ScopeKind::Lifespan => "lifespan",
            ScopeKind::Other(kind) => kind,
        }
    }
}

/// Connection metadata for one exchange.
#[derive(Clone, Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub method: String,
    pub path: String,
    pub query_string: Bytes,
    /// Header entries in arrival order, names lowercased by the transport.
    pub headers: HeaderList,
    pub http_version: &'static str,
    pub client: Option<SocketAddr>,
}

impl Scope {
    /// Scope for an HTTP exchange.
    pub fn http(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Http,
            method: method.into(),
            path: path.into(),
            query_string: Bytes::new(),
            headers: Vec::new(),
            http_version: "1.1",
            client: None,
        }
    }

    /// Scope for the lifecycle handshake.
    pub fn lifespan() -> Self {
        Self {
            kind: ScopeKind::Lifespan,
            ..Self::http("", "")
        }
    }

    /// Scope of a protocol the application does not handle.
    pub fn other(kind: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Other(kind.into()),
            ..Self::http("", "")
        }
    }

    pub fn with_query(mut self, query: impl Into<Bytes>) -> Self {
        self.query_string = query.into();
        self
    }

    /// Append a header entry. The name is lowercased.
    pub fn with_header(mut self, name: &str, value: impl Into<Bytes>) -> Self {
        self.headers
            .push((Bytes::from(name.to_ascii_lowercase()), value.into()));
        self
    }

    pub fn with_client(mut self, client: SocketAddr) -> Self {
        self.client = Some(client);
        self
    }

    #[inline]
    pub fn is_http(&self) -> bool {
        self.kind == ScopeKind::Http
    }
}

/// Messages exchanged across the boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Inbound body chunk.
    Request { body: Bytes, more_body: bool },
    /// Client went away; no more body will arrive.
    Disconnect,
    /// Outbound status line and headers.
    ResponseStart { status: StatusCode, headers: HeaderList },
    /// Outbound body chunk.
    ResponseBody { body: Bytes, more_body: bool },
    Startup,
    StartupComplete,
    Shutdown,
    ShutdownComplete,
}

impl Message {
    /// Dotted wire name of the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Request { .. } => "http.request",
            Message::Disconnect => "http.disconnect",
            Message::ResponseStart { .. } => "http.response.start",
            Message::ResponseBody { .. } => "http.response.body",
            Message::Startup => "lifespan.startup",
            Message::StartupComplete => "lifespan.startup.complete",
            Message::Shutdown => "lifespan.shutdown",
            Message::ShutdownComplete => "lifespan.shutdown.complete",
        }
    }

    /// Final body chunk of a response.
    pub fn body(body: impl Into<Bytes>) -> Self {
        Message::ResponseBody {
            body: body.into(),
            more_body: false,
        }
    }
}

/// Failure crossing the gateway boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The transport stopped accepting messages.
    Closed,
    /// A message arrived out of protocol order.
    Protocol(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Closed => write!(f, "transport closed"),
            GatewayError::Protocol(msg) => write!(f, "protocol error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

type RecvFn = dyn Fn() -> BoxFuture<'static, Message> + Send + Sync;
type SendFn = dyn Fn(Message) -> BoxFuture<'static, Result<(), GatewayError>> + Send + Sync;

/// Receive operation for one exchange.
#[derive(Clone)]
pub struct Receiver {
    inner: Arc<RecvFn>,
}

impl Receiver {
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Message> + Send + 'static,
    {
        Self {
            inner: Arc::new(move || Box::pin(f())),
        }
    }

    /// Receiver backed by a channel. Yields `Disconnect` once the channel closes.
    pub fn channel(rx: mpsc::Receiver<Message>) -> Self {
        let rx = Arc::new(Mutex::new(rx));
        Self::from_fn(move || {
            let rx = Arc::clone(&rx);
            async move { rx.lock().await.recv().await.unwrap_or(Message::Disconnect) }
        })
    }

    /// Receiver with nothing to deliver.
    pub fn disconnected() -> Self {
        Self::from_fn(|| async { Message::Disconnect })
    }

    #[inline]
    pub async fn recv(&self) -> Message {
        (self.inner)().await
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Receiver")
    }
}

/// Send operation for one exchange.
#[derive(Clone)]
pub struct Sender {
    inner: Arc<SendFn>,
}

impl Sender {
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), GatewayError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |msg| Box::pin(f(msg))),
        }
    }

    /// Sender backed by a channel.
    pub fn channel(tx: mpsc::Sender<Message>) -> Self {
        Self::from_fn(move |msg| {
            let tx = tx.clone();
            async move { tx.send(msg).await.map_err(|_| GatewayError::Closed) }
        })
    }

    /// Wrap this sender, rewriting every message before it is forwarded.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(Message) -> Message + Send + Sync + 'static,
    {
        let inner = self.clone();
        let f = Arc::new(f);
        Self::from_fn(move |msg| {
            let inner = inner.clone();
            let msg = f(msg);
            async move { inner.send(msg).await }
        })
    }

    #[inline]
    pub async fn send(&self, msg: Message) -> Result<(), GatewayError> {
        (self.inner)(msg).await
    }
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sender")
    }
}

/// A gateway application: one call per exchange.
pub type GatewayApp =
    Arc<dyn Fn(Scope, Receiver, Sender) -> BoxFuture<'static, Result<(), GatewayError>> + Send + Sync>;

/// Build a [`GatewayApp`] from an async closure.
pub fn app_fn<F, Fut>(f: F) -> GatewayApp
where
    F: Fn(Scope, Receiver, Sender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), GatewayError>> + Send + 'static,
{
    Arc::new(move |scope, receive, send| Box::pin(f(scope, receive, send)))
}

/// Append a header to an outbound `ResponseStart`; other messages pass through.
pub fn append_header(msg: Message, name: &'static str, value: impl Into<Bytes>) -> Message {
    match msg {
        Message::ResponseStart {
            status,
            mut headers,
        } => {
            headers.push((Bytes::from_static(name.as_bytes()), value.into()));
            Message::ResponseStart { status, headers }
        }
        other => other,
    }
}
