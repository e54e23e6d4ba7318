//! Access logging middleware.
//!
//! Logs each HTTP exchange as one structured `tracing` event at INFO level
//! with target `"access"`.

use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::Middleware;
use crate::gateway::{app_fn, GatewayApp, Message, Scope};

/// Access logging middleware.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessLog;

/// The access log layer.
pub fn layer() -> AccessLog {
    AccessLog
}

/// Status and body size observed on the way out.
#[derive(Default)]
struct Observed {
    status: AtomicU16,
    bytes: AtomicU64,
}

impl Observed {
    fn record(&self, msg: &Message) {
        match msg {
            Message::ResponseStart { status, .. } => {
                self.status.store(status.as_u16(), Ordering::Relaxed)
            }
            Message::ResponseBody { body, .. } => {
                self.bytes.fetch_add(body.len() as u64, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}

fn header<'a>(scope: &'a Scope, name: &str) -> Option<&'a str> {
    scope
        .headers
        .iter()
        .rev()
        .find(|(n, _)| n.eq_ignore_ascii_case(name.as_bytes()))
        .and_then(|(_, v)| std::str::from_utf8(v).ok())
}

impl Middleware for AccessLog {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn wrap(&self, inner: GatewayApp) -> GatewayApp {
        app_fn(move |scope: Scope, receive, send| {
            let inner = inner.clone();
            async move {
                if !scope.is_http() {
                    return inner(scope, receive, send).await;
                }

                let started = Instant::now();
                let observed = Arc::new(Observed::default());
                let send = {
                    let observed = Arc::clone(&observed);
                    send.map(move |msg| {
                        observed.record(&msg);
                        msg
                    })
                };

                let method = scope.method.clone();
                let path = scope.path.clone();
                let query = String::from_utf8_lossy(&scope.query_string).into_owned();
                let ua = header(&scope, "user-agent").map(str::to_string);
                let request_id = header(&scope, "x-request-id").map(str::to_string);
                let client = scope.client;
                let http = scope.http_version;

                let result = inner(scope, receive, send).await;

                let status = observed.status.load(Ordering::Relaxed);
                tracing::info!(
                    target: "access",
                    method = %method,
                    path = %path,
                    query = (!query.is_empty()).then_some(query.as_str()),
                    status = status,
                    bytes = observed.bytes.load(Ordering::Relaxed),
                    duration_ms = started.elapsed().as_secs_f64() * 1000.0,
                    ip = client.map(|addr| addr.ip().to_string()),
                    ua = ua.as_deref(),
                    request_id = request_id.as_deref(),
                    http = http,
                    "{} {} {}",
                    method,
                    path,
                    status
                );

                result
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Receiver, Sender};
    use bytes::Bytes;
    use http::StatusCode;
    use tokio::sync::mpsc;

    fn endpoint() -> GatewayApp {
        app_fn(|_scope, _receive, send: Sender| async move {
            send.send(Message::ResponseStart {
                status: StatusCode::CREATED,
                headers: Vec::new(),
            })
            .await?;
            send.send(Message::ResponseBody {
                body: Bytes::from_static(b"abc"),
                more_body: true,
            })
            .await?;
            send.send(Message::body("de")).await
        })
    }

    #[test]
    fn test_observed_counts_status_and_bytes() {
        let observed = Observed::default();
        observed.record(&Message::ResponseStart {
            status: StatusCode::NOT_FOUND,
            headers: Vec::new(),
        });
        observed.record(&Message::body("12345"));
        observed.record(&Message::body("67"));

        assert_eq!(observed.status.load(Ordering::Relaxed), 404);
        assert_eq!(observed.bytes.load(Ordering::Relaxed), 7);
    }

    #[tokio::test]
    async fn test_messages_pass_through_unchanged() {
        let app = layer().wrap(endpoint());
        let (tx, mut rx) = mpsc::channel(8);

        app(
            Scope::http("POST", "/items").with_header("user-agent", "test/1.0"),
            Receiver::disconnected(),
            Sender::channel(tx),
        )
        .await
        .unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(Message::ResponseStart { status: StatusCode::CREATED, ref headers }) if headers.is_empty()
        ));
        assert!(matches!(rx.recv().await, Some(Message::ResponseBody { more_body: true, .. })));
        assert_eq!(rx.recv().await, Some(Message::body("de")));
    }

    #[tokio::test]
    async fn test_non_http_scope_is_not_logged() {
        let app = layer().wrap(app_fn(|scope: Scope, _, _| async move {
            assert!(!scope.is_http());
            Ok(())
        }));
        app(Scope::other("websocket"), Receiver::disconnected(), Sender::from_fn(|_| async { Ok(()) }))
            .await
            .unwrap();
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let scope = Scope::http("GET", "/").with_header("User-Agent", "ua/1");
        assert_eq!(header(&scope, "user-agent"), Some("ua/1"));
        assert_eq!(header(&scope, "referer"), None);
    }
}
