//! Middleware composition around the dispatcher.
//!
//! A middleware wraps an application and returns a new one. It can:
//! - Inspect or rewrite the scope before calling the inner app
//! - Short-circuit and answer without calling the inner app
//! - Rewrite outgoing messages by wrapping the [`Sender`](crate::gateway::Sender)
//!
//! # Ordering
//!
//! The first-registered middleware ends up outermost:
//!
//! ```text
//! Request → MW1 → MW2 → Dispatcher
//!                          ↓
//! Response ← MW1 ← MW2 ←───┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use blazeapi::gateway::{app_fn, append_header, GatewayApp};
//!
//! app.add_middleware(|inner: GatewayApp| {
//!     app_fn(move |scope, receive, send| {
//!         let inner = inner.clone();
//!         let send = send.map(|msg| append_header(msg, "x-powered-by", "blazeapi"));
//!         async move { inner(scope, receive, send).await }
//!     })
//! });
//! ```

mod chain;

pub mod access_log;
pub mod request_id;

pub use chain::MiddlewareChain;

use crate::gateway::GatewayApp;

/// A wrapping layer: `(inner app) -> wrapped app`.
///
/// Any `Fn(GatewayApp) -> GatewayApp` closure is a middleware.
pub trait Middleware: Send + Sync {
    /// Name used for logging and introspection.
    fn name(&self) -> &'static str {
        "anonymous"
    }

    /// Wrap `inner`.
    fn wrap(&self, inner: GatewayApp) -> GatewayApp;
}

impl<F> Middleware for F
where
    F: Fn(GatewayApp) -> GatewayApp + Send + Sync,
{
    fn wrap(&self, inner: GatewayApp) -> GatewayApp {
        self(inner)
    }
}
