//! Middleware ordering, short-circuiting and the built-in layers.

use std::sync::{Arc, Mutex};

use blazeapi::config::AppConfig;
use blazeapi::gateway::{app_fn, append_header, GatewayApp, Sender};
use blazeapi::middleware::{access_log, request_id};
use blazeapi::Response;
use http::StatusCode;

use crate::helpers::*;

type Seen = Arc<Mutex<Vec<&'static str>>>;

/// Records `tag` on the way in and appends `x-layer: <tag>` on the way out.
fn tagging(tag: &'static str, seen: Seen) -> impl Fn(GatewayApp) -> GatewayApp + Send + Sync {
    move |inner: GatewayApp| {
        let seen = Arc::clone(&seen);
        app_fn(move |scope, receive, send: Sender| {
            seen.lock().unwrap().push(tag);
            let inner = inner.clone();
            let send = send.map(move |msg| append_header(msg, "x-layer", tag));
            async move { inner(scope, receive, send).await }
        })
    }
}

#[tokio::test]
async fn test_first_registered_is_outermost() {
    let seen: Seen = Arc::default();
    let app = demo_app(AppConfig::default());
    app.add_middleware(tagging("m1", Arc::clone(&seen)));
    app.add_middleware(tagging("m2", Arc::clone(&seen)));
    let client = client(app);

    let resp = client.get("/users/1").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(*seen.lock().unwrap(), vec!["m1", "m2"]);

    let layers: Vec<&str> = resp
        .headers
        .iter()
        .filter(|(name, _)| name == "x-layer")
        .map(|(_, value)| value.as_str())
        .collect();
    // M1's header survives M2 wrapping the response
    assert_eq!(layers, vec!["m2", "m1"]);
}

#[tokio::test]
async fn test_middleware_can_short_circuit() {
    let app = demo_app(AppConfig::default());
    app.add_middleware(|inner: GatewayApp| -> GatewayApp {
        app_fn(move |scope, receive, send: Sender| {
            let inner = inner.clone();
            async move {
                let authorized = scope
                    .headers
                    .iter()
                    .any(|(name, value)| name.as_ref() == b"authorization" && value.as_ref() == b"Bearer ok");
                if authorized {
                    inner(scope, receive, send).await
                } else {
                    Response::builder()
                        .status(StatusCode::UNAUTHORIZED)
                        .json()
                        .body(r#"{"detail":"Unauthorized"}"#)
                        .build()
                        .send(&send)
                        .await
                }
            }
        })
    });
    let client = client(app);

    assert_eq!(client.get("/users/1").await.status, StatusCode::UNAUTHORIZED);
    let ok = client
        .request(blazeapi::testing::TestRequest::new("GET", "/users/1").header("Authorization", "Bearer ok"))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
}

#[tokio::test]
async fn test_middleware_sees_404s() {
    let seen: Seen = Arc::default();
    let app = demo_app(AppConfig::default());
    app.add_middleware(tagging("outer", Arc::clone(&seen)));

    let resp = client(app).get("/nowhere").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.header("x-layer"), Some("outer"));
}

#[tokio::test]
async fn test_builtin_layers_together() {
    let app = demo_app(AppConfig::default());
    app.add_middleware(request_id::layer());
    app.add_middleware(access_log::layer());
    assert_eq!(app.middleware_names(), vec!["request_id", "access_log"]);
    let client = client(app);

    let resp = client
        .request(blazeapi::testing::TestRequest::new("GET", "/users/2").header("x-request-id", "trace-77"))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("x-request-id"), Some("trace-77"));

    let generated = client.get("/users/2").await;
    let id = generated.header("x-request-id").unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}
