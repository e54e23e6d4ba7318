//! The application object: route registration, middleware and the entry point.
//!
//! ```rust,ignore
//! use blazeapi::{Application, Endpoint, TypeDesc};
//!
//! let mut app = Application::new();
//! app.get("/users/{id:int}", Endpoint::cooperative("get_user", get_user)
//!     .param("id", TypeDesc::Int)
//!     .returns(TypeDesc::model::<User>()))?;
//! app.add_middleware(blazeapi::middleware::request_id::layer());
//!
//! let gateway = Arc::new(app).gateway();
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::dispatch::{Dispatcher, RouteTable};
use crate::gateway::{app_fn, lifespan, GatewayApp, GatewayError, Receiver, Scope, ScopeKind, Sender};
use crate::handler::{Endpoint, ExecutionMode, HandlerId, HandlerMeta};
use crate::middleware::{access_log, Middleware, MiddlewareChain};
use crate::pool::LazyPool;
use crate::routing::BadPattern;
use crate::validation::{self, SignatureError};

/// Thread name prefix of the blocking pool.
const POOL_NAME: &str = "blaze-blocking";

/// Why a route could not be registered.
#[derive(Clone, PartialEq, Eq)]
pub enum RegisterError {
    Pattern(BadPattern),
    Signature(SignatureError),
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::Pattern(e) => write!(f, "{}", e),
            RegisterError::Signature(e) => write!(f, "{}", e),
        }
    }
}

// Debug shows the rendered message so `?` in main prints something readable.
impl fmt::Debug for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for RegisterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegisterError::Pattern(e) => Some(e),
            RegisterError::Signature(e) => Some(e),
        }
    }
}

impl From<BadPattern> for RegisterError {
    fn from(e: BadPattern) -> Self {
        RegisterError::Pattern(e)
    }
}

impl From<SignatureError> for RegisterError {
    fn from(e: SignatureError) -> Self {
        RegisterError::Signature(e)
    }
}

/// One registered route, for introspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteInfo {
    pub id: HandlerId,
    pub method: String,
    pub path: String,
    pub handler: String,
    pub mode: ExecutionMode,
}

/// Routes, handler metadata and middleware behind one gateway entry point.
///
/// Routes are registered through `&mut self` during setup. Middleware can be
/// added through a shared reference; the composed chain is rebuilt under a
/// write lock and readers only ever clone a finished chain.
pub struct Application {
    config: AppConfig,
    routes: Arc<RouteTable>,
    chain: RwLock<MiddlewareChain>,
    pool: Arc<LazyPool>,
}

impl Application {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let mut chain = MiddlewareChain::new();
        if config.access_log {
            chain.add(access_log::layer());
        }

        let pool = LazyPool::new(config.blocking_workers, config.blocking_queue, POOL_NAME);

        Self {
            config,
            routes: Arc::new(RouteTable::new()),
            chain: RwLock::new(chain),
            pool: Arc::new(pool),
        }
    }

    #[inline]
    pub fn strict(&self) -> bool {
        self.config.strict
    }

    #[inline]
    pub fn debug(&self) -> bool {
        self.config.debug
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Register `endpoint` for `method` and `path`.
    ///
    /// In strict mode the declared signature is checked first. Nothing is
    /// registered when either the signature or the template is rejected.
    pub fn route(
        &mut self,
        method: &str,
        path: &str,
        endpoint: Endpoint,
    ) -> Result<HandlerId, RegisterError> {
        if self.config.strict {
            validation::validate(endpoint.name(), method, path, endpoint.signature())?;
        }

        let name = endpoint.name().to_string();
        let mode = endpoint.mode();
        let id = Arc::make_mut(&mut self.routes).register(method, path, endpoint)?;

        // the cached chain holds a dispatcher over the previous table
        self.chain
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .invalidate();

        debug!(
            method = %method.to_ascii_uppercase(),
            path = path,
            handler = %name,
            mode = %mode,
            id = %id,
            "route registered"
        );
        Ok(id)
    }

    pub fn get(&mut self, path: &str, endpoint: Endpoint) -> Result<HandlerId, RegisterError> {
        self.route("GET", path, endpoint)
    }

    pub fn post(&mut self, path: &str, endpoint: Endpoint) -> Result<HandlerId, RegisterError> {
        self.route("POST", path, endpoint)
    }

    pub fn put(&mut self, path: &str, endpoint: Endpoint) -> Result<HandlerId, RegisterError> {
        self.route("PUT", path, endpoint)
    }

    pub fn delete(&mut self, path: &str, endpoint: Endpoint) -> Result<HandlerId, RegisterError> {
        self.route("DELETE", path, endpoint)
    }

    pub fn patch(&mut self, path: &str, endpoint: Endpoint) -> Result<HandlerId, RegisterError> {
        self.route("PATCH", path, endpoint)
    }

    pub fn options(&mut self, path: &str, endpoint: Endpoint) -> Result<HandlerId, RegisterError> {
        self.route("OPTIONS", path, endpoint)
    }

    pub fn head(&mut self, path: &str, endpoint: Endpoint) -> Result<HandlerId, RegisterError> {
        self.route("HEAD", path, endpoint)
    }

    /// Append a middleware. The first one added is the outermost.
    pub fn add_middleware<M: Middleware + 'static>(&self, middleware: M) {
        self.chain
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(middleware);
    }

    /// Middleware names, outermost first.
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names()
    }

    /// The composed middleware chain around the dispatcher.
    pub fn app(&self) -> GatewayApp {
        let cached = self
            .chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cached();
        if let Some(app) = cached {
            return app;
        }

        let mut chain = self.chain.write().unwrap_or_else(PoisonError::into_inner);
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.routes),
            Arc::clone(&self.pool),
            self.config.debug,
        );
        let app = chain.compose(dispatcher.into_app());
        debug!(middleware = chain.len(), "middleware chain composed");
        app
    }

    /// Serve one exchange.
    pub async fn call(&self, scope: Scope, receive: Receiver, send: Sender) -> Result<(), GatewayError> {
        if scope.kind == ScopeKind::Lifespan {
            return lifespan::respond(&receive, &send).await;
        }

        let app = self.app();
        app(scope, receive, send).await
    }

    /// This application as a [`GatewayApp`].
    pub fn gateway(self: Arc<Self>) -> GatewayApp {
        app_fn(move |scope, receive, send| {
            let this = Arc::clone(&self);
            async move { this.call(scope, receive, send).await }
        })
    }

    /// Registered routes in lookup order.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes
            .router()
            .routes()
            .iter()
            .filter_map(|route| {
                let meta = self.routes.handler(*route.handler())?;
                Some(RouteInfo {
                    id: meta.id,
                    method: route.method().to_string(),
                    path: route.path().to_string(),
                    handler: meta.name.clone(),
                    mode: meta.mode,
                })
            })
            .collect()
    }

    pub fn handler(&self, id: HandlerId) -> Option<&HandlerMeta> {
        self.routes.handler(id)
    }

    /// Stop the blocking pool. Queued jobs still run; new ones get a 503.
    pub fn shutdown(&self) {
        if self.pool.started().is_some() {
            info!("stopping blocking pool");
        }
        self.pool.shutdown();
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("config", &self.config)
            .field("routes", &self.routes.handlers().len())
            .field("middleware", &self.middleware_names())
            .finish()
    }
}
