//! Many requests in flight at once, and blocking pool back-pressure.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use blazeapi::config::AppConfig;
use blazeapi::{Application, Args, Endpoint, HandlerResult, TypeDesc};
use futures_util::future::{self, Either};
use http::StatusCode;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

use crate::helpers::*;

#[tokio::test]
async fn test_mixed_handlers_interleave() {
    let client = Arc::new(client(demo_app(AppConfig::default().blocking_workers(4))));

    let requests = (0..64).map(|i| {
        let client = Arc::clone(&client);
        async move {
            if i % 2 == 0 {
                let resp = client.get(&format!("/users/{}", i)).await;
                (resp.status, resp.json()["id"].as_i64())
            } else {
                let resp = client.get(&format!("/square/{}", i)).await;
                (resp.status, resp.json()["square"].as_i64())
            }
        }
    });
    let results = future::join_all(requests).await;

    for (i, (status, value)) in results.into_iter().enumerate() {
        let i = i as i64;
        assert_eq!(status, StatusCode::OK);
        let expected = if i % 2 == 0 { i } else { i * i };
        assert_eq!(value, Some(expected));
    }
}

#[tokio::test]
async fn test_lifespan_alongside_requests() {
    let client = client(demo_app(AppConfig::default()));

    assert_ok!(client.lifespan().await);
    assert_eq!(client.get("/users/1").await.status, StatusCode::OK);
    assert_ok!(client.lifespan().await);
}

/// One-shot latch the blocking handler parks on.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }
}

#[tokio::test]
async fn test_saturated_pool_answers_503() {
    let gate = Arc::new(Gate::default());
    let (entered_tx, mut entered) = mpsc::unbounded_channel::<()>();

    let mut app = Application::with_config(
        AppConfig::default().blocking_workers(1).blocking_queue(1),
    );
    let handler_gate = Arc::clone(&gate);
    app.get(
        "/slow/{n:int}",
        Endpoint::blocking("slow", move |args: Args| -> HandlerResult {
            let n: i64 = args.param("n")?;
            let _ = entered_tx.send(());
            handler_gate.wait();
            Ok(json!({ "n": n }).into())
        })
        .param("n", TypeDesc::Int),
    )
    .unwrap();
    let client = Arc::new(client(app));

    // occupy the only worker
    let first = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.get("/slow/1").await }
    });
    entered.recv().await.unwrap();

    // one of these is queued, the other finds the queue full
    let second = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.get("/slow/2").await }
    });
    let third = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.get("/slow/3").await }
    });

    let (rejected, queued) = match future::select(second, third).await {
        Either::Left((done, other)) => (done.unwrap(), other),
        Either::Right((done, other)) => (done.unwrap(), other),
    };
    assert_eq!(rejected.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(rejected.json(), json!({ "detail": "Service Unavailable" }));

    gate.open();
    assert_eq!(first.await.unwrap().status, StatusCode::OK);
    let queued = tokio::time::timeout(Duration::from_secs(5), queued)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(queued.status, StatusCode::OK);
}
