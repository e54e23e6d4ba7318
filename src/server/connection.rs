//! Per-request bridge between hyper and the gateway.
//!
//! ```text
//! hyper Request ──► Scope + Receiver (body frames pumped over a channel)
//!                          │
//!                     GatewayApp task
//!                          │
//! hyper Response ◄── Sender: ResponseStart ─► oneshot ─► status + headers
//!                            ResponseBody  ─► mpsc    ─► StreamBody frames
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode, Version};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Frame, Incoming};
use percent_encoding::percent_decode_str;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, warn};

use crate::gateway::{GatewayApp, GatewayError, HeaderList, Message, Receiver, Scope, Sender};

/// Body frames queued per response before the app waits for the client.
const BODY_CHANNEL_CAPACITY: usize = 16;
/// Request body chunks read ahead of the app.
const REQUEST_CHANNEL_CAPACITY: usize = 8;

/// Streaming response body handed to hyper.
pub type ResponseBody = StreamBody<ReceiverStream<Result<Frame<Bytes>, Infallible>>>;

/// Serve one hyper request through `gateway`.
pub async fn handle_request(
    gateway: GatewayApp,
    req: http::Request<Incoming>,
    client: SocketAddr,
) -> Result<http::Response<ResponseBody>, Infallible> {
    let (parts, body) = req.into_parts();
    let scope = scope_from_parts(&parts, client);
    let method = scope.method.clone();
    let path = scope.path.clone();

    let (req_tx, req_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
    tokio::spawn(pump_body(body, req_tx));

    let (start_tx, start_rx) = oneshot::channel();
    let (frame_tx, frame_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
    let send = response_sender(start_tx, frame_tx);

    let task = tokio::spawn(gateway(scope, Receiver::channel(req_rx), send));

    match start_rx.await {
        Ok((status, headers)) => Ok(build_response(status, &headers, frame_rx)),
        Err(_) => {
            // the app returned or died without starting a response
            match task.await {
                Ok(Ok(())) => warn!(method = %method, path = %path, "app finished without a response"),
                Ok(Err(e)) => debug!(method = %method, path = %path, error = %e, "app failed before responding"),
                Err(e) => error!(method = %method, path = %path, error = %e, "app task aborted"),
            }
            Ok(fallback_response())
        }
    }
}

/// Build the gateway scope for a hyper request.
///
/// The path is percent-decoded; the query string stays raw.
pub fn scope_from_parts(parts: &http::request::Parts, client: SocketAddr) -> Scope {
    let path = percent_decode_str(parts.uri.path())
        .decode_utf8_lossy()
        .into_owned();

    let mut scope = Scope::http(parts.method.as_str(), path).with_client(client);
    if let Some(query) = parts.uri.query() {
        scope = scope.with_query(Bytes::copy_from_slice(query.as_bytes()));
    }
    scope.http_version = version_str(parts.version);
    scope.headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                Bytes::copy_from_slice(name.as_str().as_bytes()),
                Bytes::copy_from_slice(value.as_bytes()),
            )
        })
        .collect();
    scope
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

/// Forward request body frames as `http.request` messages.
async fn pump_body(mut body: Incoming, tx: mpsc::Sender<Message>) {
    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                // trailers are dropped
                let Ok(data) = frame.into_data() else { continue };
                let msg = Message::Request {
                    body: data,
                    more_body: true,
                };
                if tx.send(msg).await.is_err() {
                    return;
                }
            }
            Some(Err(e)) => {
                debug!(error = %e, "request body read failed");
                let _ = tx.send(Message::Disconnect).await;
                return;
            }
            None => {
                let _ = tx
                    .send(Message::Request {
                        body: Bytes::new(),
                        more_body: false,
                    })
                    .await;
                return;
            }
        }
    }
}

type Start = (StatusCode, HeaderList);
type FrameTx = mpsc::Sender<Result<Frame<Bytes>, Infallible>>;

/// Where the response is in its message sequence.
struct ResponseState {
    /// Present until `ResponseStart` has been sent.
    start: Option<oneshot::Sender<Start>>,
    /// Present until the final body chunk has been sent.
    body: Option<FrameTx>,
}

/// Sender that enforces start-then-body ordering and feeds hyper.
fn response_sender(start: oneshot::Sender<Start>, body: FrameTx) -> Sender {
    let state = Arc::new(Mutex::new(ResponseState {
        start: Some(start),
        body: Some(body),
    }));

    Sender::from_fn(move |msg| {
        let state = Arc::clone(&state);
        async move {
            match msg {
                Message::ResponseStart { status, headers } => {
                    let start = state
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .start
                        .take()
                        .ok_or_else(|| GatewayError::Protocol("response already started".into()))?;
                    start
                        .send((status, headers))
                        .map_err(|_| GatewayError::Closed)
                }
                Message::ResponseBody { body, more_body } => {
                    let tx = {
                        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                        if state.start.is_some() {
                            return Err(GatewayError::Protocol("body sent before response start".into()));
                        }
                        if more_body {
                            state.body.clone()
                        } else {
                            state.body.take()
                        }
                    };
                    let tx = tx.ok_or_else(|| GatewayError::Protocol("response already complete".into()))?;
                    if !body.is_empty() {
                        tx.send(Ok(Frame::data(body)))
                            .await
                            .map_err(|_| GatewayError::Closed)?;
                    }
                    Ok(())
                }
                other => Err(GatewayError::Protocol(format!(
                    "unexpected outbound message {}",
                    other.kind()
                ))),
            }
        }
    })
}

fn build_response(
    status: StatusCode,
    headers: &HeaderList,
    frames: mpsc::Receiver<Result<Frame<Bytes>, Infallible>>,
) -> http::Response<ResponseBody> {
    let mut response = http::Response::new(StreamBody::new(ReceiverStream::new(frames)));
    *response.status_mut() = status;
    *response.headers_mut() = header_map(headers);
    response
}

/// Convert gateway headers, skipping entries hyper would reject.
fn header_map(headers: &HeaderList) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let parsed = HeaderName::from_bytes(name)
            .ok()
            .zip(HeaderValue::from_maybe_shared(value.clone()).ok());
        match parsed {
            Some((name, value)) => {
                map.append(name, value);
            }
            None => warn!(
                name = %String::from_utf8_lossy(name),
                "dropping invalid response header"
            ),
        }
    }
    map
}

/// 500 for an app that never started its response.
fn fallback_response() -> http::Response<ResponseBody> {
    let body = crate::core::Response::internal_error()
        .body_bytes()
        .cloned()
        .unwrap_or_default();
    let (tx, rx) = mpsc::channel(1);
    let _ = tx.try_send(Ok(Frame::data(body)));

    let mut response = http::Response::new(StreamBody::new(ReceiverStream::new(rx)));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Connection errors that are routine and not worth logging.
pub fn is_connection_error(err_str: &str) -> bool {
    err_str.contains("connection reset")
        || err_str.contains("broken pipe")
        || err_str.contains("Connection reset")
        || err_str.contains("os error 104")
        || err_str.contains("os error 32")
        || err_str.contains("timed out")
        || err_str.contains("HeaderTimeout")
}
