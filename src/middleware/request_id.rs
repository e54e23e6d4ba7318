//! Request ID propagation.
//!
//! Reuses a well-formed incoming `x-request-id` or generates a UUID v4,
//! exposes it to inner layers through the scope, echoes it on the response
//! and records it on a tracing span around the exchange.

use bytes::Bytes;
use tracing::Instrument;
use uuid::Uuid;

use super::Middleware;
use crate::gateway::{app_fn, append_header, GatewayApp, Scope};

pub const HEADER: &str = "x-request-id";

/// Longest incoming ID that is accepted as-is.
const MAX_LEN: usize = 128;

/// Request ID middleware.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestId;

/// The request ID layer.
pub fn layer() -> RequestId {
    RequestId
}

fn is_valid(id: &[u8]) -> bool {
    !id.is_empty() && id.len() <= MAX_LEN && id.iter().all(|b| b.is_ascii_graphic())
}

/// Incoming ID if usable, otherwise a fresh one.
fn resolve(scope: &Scope) -> Bytes {
    scope
        .headers
        .iter()
        .rev()
        .find(|(name, _)| name.eq_ignore_ascii_case(HEADER.as_bytes()))
        .map(|(_, value)| value)
        .filter(|value| is_valid(value))
        .cloned()
        .unwrap_or_else(|| Bytes::from(Uuid::new_v4().to_string()))
}

impl Middleware for RequestId {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn wrap(&self, inner: GatewayApp) -> GatewayApp {
        app_fn(move |mut scope: Scope, receive, send| {
            let inner = inner.clone();
            async move {
                if !scope.is_http() {
                    return inner(scope, receive, send).await;
                }

                let id = resolve(&scope);
                scope
                    .headers
                    .retain(|(name, _)| !name.eq_ignore_ascii_case(HEADER.as_bytes()));
                scope.headers.push((Bytes::from_static(HEADER.as_bytes()), id.clone()));

                let span = tracing::info_span!("request", request_id = %String::from_utf8_lossy(&id));
                let send = {
                    let id = id.clone();
                    send.map(move |msg| append_header(msg, HEADER, id.clone()))
                };

                inner(scope, receive, send).instrument(span).await
            }
        })
    }
}
