//! Real sockets: the hyper transport in front of an application.

use std::sync::Arc;
use std::time::Duration;

use blazeapi::config::{AppConfig, ServerConfig};
use blazeapi::server::{bind_ephemeral, Server};
use blazeapi::{Application, Args, Endpoint, HandlerResult, Response};
use bytes::Bytes;
use http::StatusCode;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::helpers::*;

async fn echo(args: Args) -> HandlerResult {
    let payload: Value = args.request()?.json().await?;
    Ok(json!({ "echo": payload }).into())
}

async fn countdown(_args: Args) -> HandlerResult {
    let chunks = futures_util::stream::iter(["3,", "2,", "1"].map(|s| Bytes::from_static(s.as_bytes())));
    Ok(Response::stream(StatusCode::OK, chunks).into())
}

struct Running {
    base: String,
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<std::io::Result<()>>,
}

async fn start() -> Running {
    let mut app = demo_app(AppConfig::default().blocking_workers(2));
    app.post("/echo", Endpoint::cooperative("echo", echo).with_request())
        .unwrap();
    app.get("/countdown", Endpoint::cooperative("countdown", countdown))
        .unwrap();

    let (listener, addr) = bind_ephemeral().await.unwrap();
    let config = ServerConfig {
        listen_addr: addr,
        drain_timeout: Duration::from_secs(2),
        ..ServerConfig::default()
    };
    let (stop, stopped) = oneshot::channel::<()>();
    let server = Server::new(config, Arc::new(app));
    let task = tokio::spawn(server.serve(listener, async {
        let _ = stopped.await;
    }));

    Running {
        base: format!("http://{}", addr),
        stop,
        task,
    }
}

#[tokio::test]
async fn test_http_round_trip() {
    let running = start().await;
    let http = reqwest::Client::new();

    let resp = http
        .get(format!("{}/users/5", running.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({ "id": 5, "name": "user-5" })
    );

    let resp = http
        .post(format!("{}/echo", running.base))
        .json(&json!({ "hello": ["world"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({ "echo": { "hello": ["world"] } })
    );

    let resp = http
        .get(format!("{}/missing", running.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    assert_eq!(resp.text().await.unwrap(), r#"{"detail":"Not Found"}"#);

    let resp = http
        .get(format!("{}/square/9", running.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.json::<Value>().await.unwrap()["square"], 81);

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_streamed_response() {
    let running = start().await;

    let body = reqwest::get(format!("{}/countdown", running.base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "3,2,1");

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_percent_encoded_path_is_decoded() {
    let running = start().await;

    // %2D is '-'
    let resp = reqwest::get(format!("{}/users/%2D4", running.base))
        .await
        .unwrap();
    assert_eq!(resp.json::<Value>().await.unwrap()["id"], -4);

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_stops_accepting_after_shutdown() {
    let running = start().await;
    let base = running.base.clone();

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();

    assert!(reqwest::get(format!("{}/users/1", base)).await.is_err());
}

#[tokio::test]
async fn test_drain_timeout_closes_stuck_connections() {
    let (entered_tx, mut entered) = tokio::sync::mpsc::unbounded_channel::<()>();
    let mut app = Application::new();
    app.get(
        "/hang",
        Endpoint::cooperative("hang", move |_args: Args| {
            let entered = entered_tx.clone();
            async move {
                let _ = entered.send(());
                std::future::pending::<HandlerResult>().await
            }
        }),
    )
    .unwrap();

    let (listener, addr) = bind_ephemeral().await.unwrap();
    let config = ServerConfig {
        listen_addr: addr,
        drain_timeout: Duration::from_millis(100),
        ..ServerConfig::default()
    };
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(Server::new(config, Arc::new(app)).serve(listener, async {
        let _ = stopped.await;
    }));

    let request = tokio::spawn(reqwest::get(format!("http://{}/hang", addr)));
    entered.recv().await.unwrap();

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // the connection was torn down instead of left running
    let outcome = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.is_err());
}
