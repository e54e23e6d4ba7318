//! HTTP response abstraction and its gateway encoding.

use std::fmt;

use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;

use crate::gateway::{GatewayError, HeaderList, Message, Sender};

/// Pre-allocated static header values for common content types.
mod content_types {
    use super::*;
    pub static TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
    pub static APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
}

/// Pre-allocated static bodies for the framework's own error responses.
mod static_bodies {
    use super::*;
    pub static NOT_FOUND: Bytes = Bytes::from_static(br#"{"detail":"Not Found"}"#);
    pub static INTERNAL_ERROR: Bytes = Bytes::from_static(br#"{"detail":"Internal Server Error"}"#);
    pub static SERVICE_UNAVAILABLE: Bytes =
        Bytes::from_static(br#"{"detail":"Service Unavailable"}"#);
}

/// Response body: fully buffered, or produced chunk by chunk.
pub enum Body {
    Full(Bytes),
    Stream(BoxStream<'static, Bytes>),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Full(Bytes::new())
    }
}

/// HTTP response.
///
/// Note: Clone is intentionally not derived to prevent expensive copies.
/// Use references or move semantics instead.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

#[derive(Serialize)]
struct Detail<'a> {
    detail: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    traceback: Option<&'a str>,
}

impl Response {
    /// Create a new response builder.
    #[inline]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    /// Create a 200 OK response with body.
    #[inline]
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Body::Full(body.into()),
        }
    }

    /// 200 OK with a `text/plain` body.
    #[inline]
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text().body(body.into()).build()
    }

    /// 200 OK with a compact JSON body and `application/json` content type.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::builder().json().body(body).build())
    }

    /// Response whose body is produced by a stream of chunks.
    pub fn stream<S>(status: StatusCode, chunks: S) -> Self
    where
        S: futures_util::Stream<Item = Bytes> + Send + 'static,
    {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::Stream(chunks.boxed()),
        }
    }

    /// Create an empty response with given status.
    #[inline]
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::default(),
        }
    }

    /// `404 {"detail": "Not Found"}` (uses static body).
    #[inline]
    pub fn not_found() -> Self {
        Self::builder()
            .status(StatusCode::NOT_FOUND)
            .json()
            .body(static_bodies::NOT_FOUND.clone())
            .build()
    }

    /// `500 {"detail": "Internal Server Error"}` (uses static body).
    #[inline]
    pub fn internal_error() -> Self {
        Self::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .json()
            .body(static_bodies::INTERNAL_ERROR.clone())
            .build()
    }

    /// 500 carrying the formatted failure trace in a `traceback` field.
    pub fn internal_error_with_trace(trace: &str) -> Self {
        let detail = Detail {
            detail: "Internal Server Error",
            traceback: Some(trace),
        };
        match serde_json::to_vec(&detail) {
            Ok(body) => Self::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .json()
                .body(body)
                .build(),
            Err(_) => Self::internal_error(),
        }
    }

    /// `503 {"detail": "Service Unavailable"}` (uses static body).
    #[inline]
    pub fn service_unavailable() -> Self {
        Self::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .json()
            .body(static_bodies::SERVICE_UNAVAILABLE.clone())
            .build()
    }

    // Getters

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[inline]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Buffered body bytes, `None` for streaming bodies.
    #[inline]
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Full(bytes) => Some(bytes),
            Body::Stream(_) => None,
        }
    }

    /// Get a header value by string name (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    // Modifiers

    #[inline]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header by string name and value. Invalid names or values are ignored.
    #[inline]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    #[inline]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Full(body.into());
        self
    }

    /// Emit this response over the gateway: one `ResponseStart`, then the body.
    ///
    /// A buffered body goes out as a single final chunk. A streaming body sends
    /// one chunk per item followed by an empty final chunk.
    pub async fn send(self, send: &Sender) -> Result<(), GatewayError> {
        let headers: HeaderList = self
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    Bytes::copy_from_slice(name.as_str().as_bytes()),
                    Bytes::copy_from_slice(value.as_bytes()),
                )
            })
            .collect();

        send.send(Message::ResponseStart {
            status: self.status,
            headers,
        })
        .await?;

        match self.body {
            Body::Full(body) => send.send(Message::body(body)).await,
            Body::Stream(mut chunks) => {
                while let Some(body) = chunks.next().await {
                    send.send(Message::ResponseBody {
                        body,
                        more_body: true,
                    })
                    .await?;
                }
                send.send(Message::body(Bytes::new())).await
            }
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::empty(StatusCode::OK)
    }
}

/// Builder for creating HTTP responses.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Option<HeaderMap>, // Lazy allocation
    body: Bytes,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: None,
            body: Bytes::new(),
        }
    }

    #[inline]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add header with typed HeaderName and HeaderValue (zero-alloc for static values).
    #[inline]
    pub fn header_value(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .insert(name, value);
        self
    }

    /// Add header by strings.
    #[inline]
    pub fn header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => self.header_value(name, value),
            _ => self,
        }
    }

    #[inline]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[inline]
    pub fn content_type(self, content_type: &str) -> Self {
        self.header("content-type", content_type)
    }

    /// Set Content-Type to application/json (uses static HeaderValue).
    #[inline]
    pub fn json(self) -> Self {
        self.header_value(header::CONTENT_TYPE, content_types::APPLICATION_JSON.clone())
    }

    /// Set Content-Type to text/plain (uses static HeaderValue).
    #[inline]
    pub fn text(self) -> Self {
        self.header_value(header::CONTENT_TYPE, content_types::TEXT_PLAIN.clone())
    }

    #[inline]
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers.unwrap_or_default(),
            body: Body::Full(self.body),
        }
    }
}
