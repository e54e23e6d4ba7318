//! Registration-time checks: strict signatures and bad templates.

use blazeapi::config::AppConfig;
use blazeapi::{Application, Args, BadPattern, Endpoint, HandlerResult, RegisterError, TypeDesc};
use http::StatusCode;
use serde::Deserialize;

use crate::helpers::*;

#[allow(dead_code)]
#[derive(Deserialize)]
struct NewUser {
    name: String,
}

async fn noop(_args: Args) -> HandlerResult {
    Ok("ok".into())
}

fn strict_app() -> Application {
    Application::with_config(AppConfig::default().strict(true))
}

fn signature_error(err: RegisterError) -> blazeapi::SignatureError {
    match err {
        RegisterError::Signature(e) => e,
        other => panic!("expected a signature error, got {}", other),
    }
}

#[test]
fn test_missing_return_annotation() {
    let mut app = strict_app();
    let err = app
        .get("/users/{id:int}", Endpoint::cooperative("get_user", get_user).param("id", TypeDesc::Int))
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("get_user"), "{}", message);
    assert!(message.contains("Missing return type annotation"), "{}", message);
    assert!(app.routes().is_empty());
}

#[test]
fn test_primitive_return_rejected() {
    let mut app = strict_app();
    for ty in [TypeDesc::Map, TypeDesc::List, TypeDesc::Str, TypeDesc::Int, TypeDesc::Bool] {
        let err = app
            .get("/x", Endpoint::cooperative("noop", noop).returns(ty))
            .unwrap_err();
        assert_eq!(signature_error(err).code, "unstructured-return");
    }
    assert!(app.routes().is_empty());
}

#[test]
fn test_untyped_param_rejected() {
    let mut app = strict_app();
    let err = app
        .get(
            "/users/{id}",
            Endpoint::cooperative("get_user", get_user)
                .untyped("id")
                .returns(TypeDesc::response()),
        )
        .unwrap_err();

    let err = signature_error(err);
    assert_eq!(err.code, "untyped-param");
    assert!(err.to_string().contains("'id'"));
}

#[test]
fn test_non_path_param_must_be_model() {
    let mut app = strict_app();
    let err = app
        .post(
            "/users",
            Endpoint::cooperative("create", noop)
                .param("payload", TypeDesc::Map)
                .returns(TypeDesc::response()),
        )
        .unwrap_err();
    assert_eq!(signature_error(err).code, "non-model-param");

    // same shape with a model parameter is accepted
    app.post(
        "/users",
        Endpoint::cooperative("create", noop)
            .param("payload", TypeDesc::model::<NewUser>())
            .returns(TypeDesc::response()),
    )
    .unwrap();
    assert_eq!(app.routes().len(), 1);
}

#[test]
fn test_path_param_and_request_accept_any_type() {
    let mut app = strict_app();
    app.get(
        "/users/{id:int}/{slug}",
        Endpoint::cooperative("get_user", get_user)
            .param("id", TypeDesc::Int)
            .param("slug", TypeDesc::Str)
            .with_request()
            .returns(TypeDesc::model::<User>()),
    )
    .unwrap();
}

#[test]
fn test_unknown_param_type_fails_registration() {
    let mut app = Application::new();
    let err = app
        .get("/when/{day:date}", Endpoint::cooperative("noop", noop))
        .unwrap_err();

    match err {
        RegisterError::Pattern(BadPattern::UnknownType { token, .. }) => assert_eq!(token, "date"),
        other => panic!("unexpected {}", other),
    }
    assert!(app.routes().is_empty());
}

#[test]
fn test_duplicate_param_fails_registration() {
    let mut app = Application::new();
    let err = app
        .get("/{id}/{id}", Endpoint::cooperative("noop", noop))
        .unwrap_err();
    assert!(matches!(err, RegisterError::Pattern(BadPattern::DuplicateParam { .. })));
}

#[tokio::test]
async fn test_strict_app_serves_valid_routes() {
    let client = client({
        let mut app = strict_app();
        app.get(
            "/users/{id:int}",
            Endpoint::cooperative("get_user", get_user)
                .param("id", TypeDesc::Int)
                .returns(TypeDesc::model::<User>()),
        )
        .unwrap();
        app
    });

    let resp = client.get("/users/3").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["name"], "user-3");
}

#[test]
fn test_std_containers_are_not_models() {
    use std::collections::HashMap;

    let mut app = strict_app();
    let returns = [
        TypeDesc::model::<Vec<User>>(),
        TypeDesc::model::<HashMap<String, User>>(),
        TypeDesc::model::<String>(),
        TypeDesc::model::<serde_json::Value>(),
    ];
    for ty in returns {
        let err = app
            .get("/users", Endpoint::cooperative("noop", noop).returns(ty))
            .unwrap_err();
        assert_eq!(signature_error(err).code, "unstructured-return");
    }

    let bodies = [
        TypeDesc::model::<Vec<NewUser>>(),
        TypeDesc::model::<HashMap<String, serde_json::Value>>(),
        TypeDesc::model::<String>(),
        TypeDesc::model::<serde_json::Value>(),
    ];
    for ty in bodies {
        let err = app
            .post(
                "/users",
                Endpoint::cooperative("create", noop)
                    .param("payload", ty)
                    .returns(TypeDesc::model::<User>()),
            )
            .unwrap_err();
        assert_eq!(signature_error(err).code, "non-model-param");
    }
    assert!(app.routes().is_empty());
}
