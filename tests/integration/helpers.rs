//! Shared handlers and app builders.

use std::sync::Arc;

use blazeapi::config::AppConfig;
use blazeapi::testing::TestClient;
use blazeapi::{Application, Args, Endpoint, HandlerError, HandlerResult, Reply, TypeDesc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
}

pub async fn get_user(args: Args) -> HandlerResult {
    let id: i64 = args.param("id")?;
    Reply::model(&User {
        id,
        name: format!("user-{}", id),
    })
}

pub async fn failing(_args: Args) -> HandlerResult {
    Err(HandlerError::msg("database unavailable"))
}

pub async fn listing(_args: Args) -> HandlerResult {
    Ok(json!([1, 2, 3]).into())
}

pub async fn count(_args: Args) -> HandlerResult {
    Ok(42_i64.into())
}

pub fn blocking_square(args: Args) -> HandlerResult {
    let n: i64 = args.param("n")?;
    Ok(json!({ "n": n, "square": n * n }).into())
}

/// App with the routes most tests share.
pub fn demo_app(config: AppConfig) -> Application {
    let mut app = Application::with_config(config);
    app.get(
        "/users/{id:int}",
        Endpoint::cooperative("get_user", get_user)
            .param("id", TypeDesc::Int)
            .returns(TypeDesc::model::<User>()),
    )
    .unwrap();
    app.get("/fail", Endpoint::cooperative("failing", failing)).unwrap();
    app.get("/list", Endpoint::cooperative("listing", listing)).unwrap();
    app.get("/count", Endpoint::cooperative("count", count)).unwrap();
    app.get(
        "/square/{n:int}",
        Endpoint::blocking("blocking_square", blocking_square).param("n", TypeDesc::Int),
    )
    .unwrap();
    app
}

pub fn client(app: Application) -> TestClient {
    TestClient::new(Arc::new(app))
}
