//! Handler invocation model.
//!
//! A handler is registered as an [`Endpoint`]: the callable, its name and the
//! [`Signature`] its author declares. At registration the application turns
//! the endpoint into a [`HandlerMeta`] stored under a stable [`HandlerId`];
//! the dispatcher only ever consults that table.
//!
//! ```rust,ignore
//! use blazeapi::handler::{Args, Endpoint, HandlerResult, TypeDesc};
//! use serde_json::json;
//!
//! async fn get_user(args: Args) -> HandlerResult {
//!     let id: i64 = args.param("id")?;
//!     Ok(json!({ "id": id }).into())
//! }
//!
//! let endpoint = Endpoint::cooperative("get_user", get_user)
//!     .param("id", TypeDesc::Int)
//!     .returns(TypeDesc::model::<User>());
//! ```

mod args;
mod error;
mod reply;
mod signature;

pub use args::{ArgError, Args};
pub use error::HandlerError;
pub use reply::Reply;
pub use signature::{Param, Signature, TypeDesc};

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

/// Result every handler produces.
pub type HandlerResult = Result<Reply, HandlerError>;

type CooperativeFn = dyn Fn(Args) -> BoxFuture<'static, HandlerResult> + Send + Sync;
type BlockingFn = dyn Fn(Args) -> HandlerResult + Send + Sync;

/// A registered callable.
#[derive(Clone)]
pub enum Handler {
    /// Runs on the event loop; awaited directly.
    Cooperative(Arc<CooperativeFn>),
    /// Ordinary blocking function; always runs on the worker pool.
    Blocking(Arc<BlockingFn>),
}

impl Handler {
    #[inline]
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Handler::Cooperative(_) => ExecutionMode::Cooperative,
            Handler::Blocking(_) => ExecutionMode::Blocking,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler::{:?}", self.mode())
    }
}

/// How a handler is executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    Cooperative,
    Blocking,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Cooperative => f.write_str("cooperative"),
            ExecutionMode::Blocking => f.write_str("blocking"),
        }
    }
}

/// A handler together with its declared shape, ready for registration.
#[derive(Clone, Debug)]
pub struct Endpoint {
    name: String,
    handler: Handler,
    signature: Signature,
}

impl Endpoint {
    /// Endpoint for an async handler.
    pub fn cooperative<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Handler::Cooperative(Arc::new(move |args| Box::pin(f(args)))),
            signature: Signature::default(),
        }
    }

    /// Endpoint for a blocking handler.
    pub fn blocking<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Args) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Handler::Blocking(Arc::new(f)),
            signature: Signature::default(),
        }
    }

    /// Declare a typed parameter.
    pub fn param(mut self, name: &str, ty: TypeDesc) -> Self {
        self.signature.push(name, Some(ty));
        self
    }

    /// Declare a parameter without a type.
    pub fn untyped(mut self, name: &str) -> Self {
        self.signature.push(name, None);
        self
    }

    /// Declare the `request` parameter.
    pub fn with_request(mut self) -> Self {
        self.signature
            .push(Signature::REQUEST_PARAM, Some(TypeDesc::Request));
        self
    }

    /// Declare the return type.
    pub fn returns(mut self, ty: TypeDesc) -> Self {
        self.signature.returns = Some(ty);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline]
    pub fn mode(&self) -> ExecutionMode {
        self.handler.mode()
    }
}

/// Stable identifier assigned at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) usize);

impl HandlerId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Invocation facts computed once per registered handler.
#[derive(Clone, Debug)]
pub struct HandlerMeta {
    pub id: HandlerId,
    pub name: String,
    pub mode: ExecutionMode,
    pub handler: Handler,
    pub wants_request: bool,
    /// Declared parameter names, excluding `request`.
    pub params: HashSet<String>,
    pub signature: Signature,
}

impl HandlerMeta {
    pub fn new(id: HandlerId, endpoint: Endpoint) -> Self {
        let Endpoint {
            name,
            handler,
            signature,
        } = endpoint;

        Self {
            id,
            name,
            mode: handler.mode(),
            wants_request: signature.wants_request(),
            params: signature.param_names().map(str::to_string).collect(),
            handler,
            signature,
        }
    }
}
