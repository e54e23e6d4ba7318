//! Routing and dispatch behaviour seen from outside.

use blazeapi::config::AppConfig;
use blazeapi::testing::TestRequest;
use blazeapi::{Application, Args, Endpoint, HandlerResult, ParamValue, Response, TypeDesc};
use http::StatusCode;
use serde_json::json;

use crate::helpers::*;

async fn file_path(args: Args) -> HandlerResult {
    let path: String = args.param("p")?;
    Ok(json!({ "path": path }).into())
}

async fn ratio(args: Args) -> HandlerResult {
    let value: f64 = args.param("r")?;
    Ok(json!({ "ratio": value }).into())
}

async fn first(_args: Args) -> HandlerResult {
    Ok("first".into())
}

async fn second(_args: Args) -> HandlerResult {
    Ok("second".into())
}

async fn raw_params(args: Args) -> HandlerResult {
    let kinds: Vec<&str> = ["id", "key"]
        .iter()
        .map(|name| match args.raw(name) {
            Some(ParamValue::Int(_)) => "int",
            Some(ParamValue::Str(_)) => "str",
            Some(ParamValue::Float(_)) => "float",
            None => "missing",
        })
        .collect();
    Ok(json!(kinds).into())
}

async fn panics(_args: Args) -> HandlerResult {
    panic!("handler bug");
}

async fn inspect(args: Args) -> HandlerResult {
    let req = args.request()?;
    Ok(json!({
        "method": req.method(),
        "path": req.path(),
        "tags": req.query_params().get("tag").cloned().unwrap_or_default(),
        "agent": req.header("User-Agent"),
        "id": req.path_param("id").cloned(),
    })
    .into())
}

#[tokio::test]
async fn test_typed_user_lookup() {
    let client = client(demo_app(AppConfig::default()));

    let resp = client.get("/users/42").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("content-type"), Some("application/json"));
    assert_eq!(
        resp.json_as::<User>().unwrap(),
        User {
            id: 42,
            name: "user-42".into()
        }
    );

    assert_eq!(client.get("/users/-7").await.json()["id"], -7);
    assert_eq!(client.get("/users/abc").await.status, StatusCode::NOT_FOUND);
    assert_eq!(client.get("/users/7.5").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_path_is_404_with_detail() {
    let resp = client(demo_app(AppConfig::default())).get("/missing").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.json(), json!({ "detail": "Not Found" }));
}

#[tokio::test]
async fn test_method_mismatch_is_404() {
    let mut app = Application::new();
    app.post("/items", Endpoint::cooperative("first", first)).unwrap();
    let client = client(app);

    assert_eq!(client.get("/items").await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        client.request(TestRequest::new("post", "/items")).await.text(),
        "first"
    );
}

#[tokio::test]
async fn test_first_registered_route_wins() {
    let mut app = Application::new();
    app.get("/dup", Endpoint::cooperative("first", first)).unwrap();
    app.get("/dup", Endpoint::cooperative("second", second)).unwrap();

    assert_eq!(client(app).get("/dup").await.text(), "first");
}

#[tokio::test]
async fn test_path_param_is_greedy() {
    let mut app = Application::new();
    app.get(
        "/files/{p:path}",
        Endpoint::cooperative("file_path", file_path).param("p", TypeDesc::Str),
    )
    .unwrap();

    let resp = client(app).get("/files/a/b/c.txt").await;
    assert_eq!(resp.json(), json!({ "path": "a/b/c.txt" }));
}

#[tokio::test]
async fn test_float_param() {
    let mut app = Application::new();
    app.get(
        "/ratio/{r:float}",
        Endpoint::cooperative("ratio", ratio).param("r", TypeDesc::Float),
    )
    .unwrap();
    let client = client(app);

    assert_eq!(client.get("/ratio/0.25").await.json(), json!({ "ratio": 0.25 }));
    assert_eq!(client.get("/ratio/3").await.json(), json!({ "ratio": 3.0 }));
    assert_eq!(client.get("/ratio/x").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_declared_params_are_passed() {
    let mut app = Application::new();
    app.get(
        "/things/{id:int}/{key:uuid}",
        Endpoint::cooperative("raw_params", raw_params).param("id", TypeDesc::Int),
    )
    .unwrap();

    let resp = client(app)
        .get("/things/3/123e4567-e89b-12d3-a456-426614174000")
        .await;
    assert_eq!(resp.json(), json!(["int", "missing"]));
}

#[tokio::test]
async fn test_handler_error_is_contained() {
    let client = client(demo_app(AppConfig::default()));

    let resp = client.get("/fail").await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.json(), json!({ "detail": "Internal Server Error" }));

    // the app keeps serving
    assert_eq!(client.get("/users/1").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_debug_mode_adds_traceback() {
    let client = client(demo_app(AppConfig::default().debug(true)));

    let body = client.get("/fail").await.json();
    assert_eq!(body["detail"], "Internal Server Error");
    assert!(body["traceback"]
        .as_str()
        .unwrap()
        .contains("database unavailable"));
}

#[tokio::test]
async fn test_panicking_handler_is_contained() {
    let mut app = Application::with_config(AppConfig::default().debug(true));
    app.get("/boom", Endpoint::cooperative("panics", panics)).unwrap();
    app.get("/ok", Endpoint::cooperative("first", first)).unwrap();
    let client = client(app);

    let resp = client.get("/boom").await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.json()["traceback"].as_str().unwrap().contains("handler bug"));
    assert_eq!(client.get("/ok").await.text(), "first");
}

#[tokio::test]
async fn test_reply_normalization() {
    let client = client(demo_app(AppConfig::default()));

    let list = client.get("/list").await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.header("content-type"), Some("application/json"));
    assert_eq!(list.text(), "[1,2,3]");

    let count = client.get("/count").await;
    assert_eq!(count.status, StatusCode::OK);
    assert!(count.header("content-type").unwrap().starts_with("text/plain"));
    assert_eq!(count.text(), "42");
}

#[tokio::test]
async fn test_response_passes_through_unchanged() {
    async fn created(_args: Args) -> HandlerResult {
        Ok(Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/9")
            .text()
            .body("made")
            .build()
            .into())
    }

    let mut app = Application::new();
    app.post("/users", Endpoint::cooperative("created", created)).unwrap();

    let resp = client(app).request(TestRequest::new("POST", "/users")).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.header("location"), Some("/users/9"));
    assert_eq!(resp.text(), "made");
}

#[tokio::test]
async fn test_blocking_handler() {
    let resp = client(demo_app(AppConfig::default().blocking_workers(2)))
        .get("/square/12")
        .await;
    assert_eq!(resp.json(), json!({ "n": 12, "square": 144 }));
}

#[tokio::test]
async fn test_request_object() {
    let mut app = Application::new();
    app.get(
        "/inspect/{id:int}",
        Endpoint::cooperative("inspect", inspect).with_request(),
    )
    .unwrap();

    let resp = client(app)
        .request(
            TestRequest::new("GET", "/inspect/5?tag=a&tag=b%20c")
                .header("User-Agent", "suite/1.0"),
        )
        .await;
    assert_eq!(
        resp.json(),
        json!({
            "method": "GET",
            "path": "/inspect/5",
            "tags": ["a", "b c"],
            "agent": "suite/1.0",
            "id": 5,
        })
    );
}

#[tokio::test]
async fn test_missing_request_declaration_is_a_handler_failure() {
    // handler reads the request without declaring it
    let mut app = Application::new();
    app.get("/inspect", Endpoint::cooperative("inspect", inspect)).unwrap();

    let resp = client(app).get("/inspect").await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
}
