use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use blazeapi::config::Config;
use blazeapi::middleware::request_id;
use blazeapi::{Application, Args, Endpoint, HandlerResult, Reply, Response, Server, TypeDesc};

#[derive(Serialize)]
struct User {
    id: i64,
    name: String,
}

#[derive(Serialize)]
struct Report {
    year: i64,
    days: u32,
    checksum: u64,
}

async fn health(_args: Args) -> HandlerResult {
    Ok(Response::json(&serde_json::json!({ "status": "ok" }))?.into())
}

async fn get_user(args: Args) -> HandlerResult {
    let id: i64 = args.param("id")?;
    Reply::model(&User {
        id,
        name: format!("user-{}", id),
    })
}

async fn echo(args: Args) -> HandlerResult {
    let payload: Value = args.request()?.json().await?;
    Ok(Response::json(&payload)?.into())
}

/// Deliberately slow; runs on the blocking pool.
fn yearly_report(args: Args) -> HandlerResult {
    let year: i64 = args.param("year")?;
    std::thread::sleep(Duration::from_millis(50));

    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days: u32 = if leap { 366 } else { 365 };
    let checksum = (1..=u64::from(days)).fold(year as u64, |acc, d| acc.rotate_left(5) ^ d);

    Reply::model(&Report {
        year,
        days,
        checksum,
    })
}

fn build_app(config: &Config) -> Result<Application, blazeapi::RegisterError> {
    let mut app = Application::with_config(config.app.clone());

    app.get(
        "/health",
        Endpoint::cooperative("health", health).returns(TypeDesc::response()),
    )?;
    app.get(
        "/users/{id:int}",
        Endpoint::cooperative("get_user", get_user)
            .param("id", TypeDesc::Int)
            .returns(TypeDesc::model::<User>()),
    )?;
    app.post(
        "/echo",
        Endpoint::cooperative("echo", echo)
            .with_request()
            .returns(TypeDesc::response()),
    )?;
    app.get(
        "/reports/{year:int}",
        Endpoint::blocking("yearly_report", yearly_report)
            .param("year", TypeDesc::Int)
            .returns(TypeDesc::model::<Report>()),
    )?;

    app.add_middleware(request_id::layer());
    Ok(app)
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    blazeapi::logging::init(&config.logging)?;

    info!("Starting blazeapi {}", blazeapi::VERSION);
    config.log_summary();

    let app = build_app(&config)?;
    for route in app.routes() {
        info!("  {} {} -> {} ({})", route.method, route.path, route.handler, route.mode);
    }

    // Single-threaded event loop; blocking handlers run on the pool
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let server = Server::new(config.server, Arc::new(app));
    runtime.block_on(server.run())?;

    Ok(())
}
