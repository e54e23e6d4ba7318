//! Per-exchange request view handed to handlers.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;

use super::error::RequestError;
use super::query::parse_query_string;
use crate::gateway::{HeaderList, Message, Receiver, Scope};
use crate::routing::{ParamValue, PathParams};

/// An inbound HTTP request.
///
/// The body is pulled from the transport on first access and cached; later
/// reads return the cached bytes without touching the transport.
///
/// Note: Clone is intentionally not derived. A request is owned by the task
/// that serves it.
#[derive(Debug)]
pub struct Request {
    method: String,
    path: String,
    query_string: Bytes,
    headers: HeaderList,
    http_version: &'static str,
    client: Option<SocketAddr>,
    path_params: PathParams,
    receive: Receiver,
    body: OnceCell<Bytes>,
    runtime: Option<Handle>,
}

impl Request {
    /// Build a request from the exchange's scope, receive operation and
    /// the converted path parameters of the matched route.
    pub fn new(scope: Scope, receive: Receiver, path_params: PathParams) -> Self {
        Self {
            method: scope.method,
            path: scope.path,
            query_string: scope.query_string,
            headers: scope.headers,
            http_version: scope.http_version,
            client: scope.client,
            path_params,
            receive,
            body: OnceCell::new(),
            runtime: Handle::try_current().ok(),
        }
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, without the leading `?`.
    #[inline]
    pub fn query_string(&self) -> &str {
        std::str::from_utf8(&self.query_string).unwrap_or("")
    }

    /// Decoded query parameters. Repeated keys keep all values in order.
    pub fn query_params(&self) -> HashMap<String, Vec<String>> {
        parse_query_string(self.query_string())
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<String> {
        self.query_params()
            .remove(name)
            .and_then(|values| values.into_iter().next())
    }

    #[inline]
    pub fn http_version(&self) -> &'static str {
        self.http_version
    }

    #[inline]
    pub fn client(&self) -> Option<SocketAddr> {
        self.client
    }

    /// Headers as a map with lowercased names. For repeated names the last
    /// value wins.
    pub fn headers(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .map(|(name, value)| {
                (
                    String::from_utf8_lossy(name).to_ascii_lowercase(),
                    String::from_utf8_lossy(value).into_owned(),
                )
            })
            .collect()
    }

    /// Get a header value by name (case-insensitive, last value wins).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.as_bytes()))
            .and_then(|(_, v)| std::str::from_utf8(v).ok())
    }

    /// Raw header entries in arrival order.
    #[inline]
    pub fn raw_headers(&self) -> &HeaderList {
        &self.headers
    }

    #[inline]
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    #[inline]
    pub fn path_param(&self, name: &str) -> Option<&ParamValue> {
        self.path_params.get(name)
    }

    /// Read the full body.
    pub async fn body(&self) -> Result<Bytes, RequestError> {
        self.body
            .get_or_try_init(|| read_body(&self.receive))
            .await
            .cloned()
    }

    /// Body decoded as UTF-8, invalid sequences replaced.
    pub async fn text(&self) -> Result<String, RequestError> {
        let body = self.body().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Body parsed as JSON.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        let body = self.body().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Read the full body from a blocking handler running on the worker pool.
    ///
    /// Must not be called from inside the async runtime.
    pub fn blocking_body(&self) -> Result<Bytes, RequestError> {
        if let Some(body) = self.body.get() {
            return Ok(body.clone());
        }
        let runtime = self.runtime.as_ref().ok_or(RequestError::NoRuntime)?;
        runtime.block_on(self.body())
    }

    /// Blocking counterpart of [`Request::json`].
    pub fn blocking_json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        let body = self.blocking_body()?;
        Ok(serde_json::from_slice(&body)?)
    }
}

async fn read_body(receive: &Receiver) -> Result<Bytes, RequestError> {
    let mut buf = BytesMut::new();
    loop {
        match receive.recv().await {
            Message::Request { body, more_body } => {
                buf.extend_from_slice(&body);
                if !more_body {
                    return Ok(buf.freeze());
                }
            }
            Message::Disconnect => return Err(RequestError::Disconnected),
            other => {
                tracing::debug!(kind = other.kind(), "unexpected message while reading body");
            }
        }
    }
}
