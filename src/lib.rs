//! blazeapi - request routing and dispatch over an async server gateway.
//!
//! Handlers are registered against `(method, path template)` pairs. At
//! request time the application matches the route, converts path
//! parameters, runs the handler cooperatively or on a bounded blocking pool
//! and turns its reply into a response. Handler failures become a 500 and
//! never escape the request.
//!
//! # Features
//!
//! - **Typed path parameters**: `{id:int}`, `{ratio:float}`, `{key:uuid}`, `{rest:path}`
//! - **Two execution modes**: async handlers on the event loop, blocking ones on a thread pool
//! - **Strict mode**: declared handler signatures are checked at registration
//! - **Middleware chain**: composed once, rebuilt only when it changes
//! - **Transport**: hyper HTTP/1.1 + HTTP/2 server with graceful drain
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use blazeapi::{Application, Args, Endpoint, HandlerResult, TypeDesc};
//! use serde_json::json;
//!
//! async fn get_user(args: Args) -> HandlerResult {
//!     let id: i64 = args.param("id")?;
//!     Ok(json!({ "id": id }).into())
//! }
//!
//! let mut app = Application::new();
//! app.get("/users/{id:int}", Endpoint::cooperative("get_user", get_user)
//!     .param("id", TypeDesc::Int))?;
//!
//! let server = blazeapi::Server::new(Default::default(), Arc::new(app));
//! server.run().await?;
//! ```

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod app;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod gateway;
pub mod handler;
pub mod logging;
pub mod middleware;
pub mod pool;
pub mod routing;
pub mod server;
pub mod testing;
pub mod validation;

// Re-exports for convenience
pub use app::{Application, RegisterError, RouteInfo};
pub use config::{AppConfig, Config, ServerConfig};
pub use core::{Request, Response};
pub use handler::{Args, Endpoint, HandlerError, HandlerId, HandlerResult, Reply, TypeDesc};
pub use routing::{BadPattern, ParamValue};
pub use server::Server;
pub use validation::SignatureError;
