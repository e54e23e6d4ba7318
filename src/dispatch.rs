//! Per-request dispatch: match, build arguments, invoke, normalize.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, warn};

use crate::core::{Request, Response};
use crate::gateway::{app_fn, lifespan, GatewayApp, GatewayError, Receiver, Scope, ScopeKind, Sender};
use crate::handler::{Args, Endpoint, Handler, HandlerError, HandlerId, HandlerMeta, HandlerResult};
use crate::pool::{LazyPool, PoolError};
use crate::routing::{BadPattern, PathParams, Router};

/// Routes and the handler metadata they point at.
///
/// Built during setup and read-only while serving.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    router: Router<HandlerId>,
    handlers: Vec<HandlerMeta>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile the route and record the handler's metadata under a new id.
    /// Nothing is recorded if the template does not compile.
    pub fn register(
        &mut self,
        method: &str,
        path: &str,
        endpoint: Endpoint,
    ) -> Result<HandlerId, BadPattern> {
        let id = HandlerId(self.handlers.len());
        let meta = HandlerMeta::new(id, endpoint);
        self.router.add_route(method, path, id)?;
        self.handlers.push(meta);
        Ok(id)
    }

    #[inline]
    pub fn router(&self) -> &Router<HandlerId> {
        &self.router
    }

    #[inline]
    pub fn handler(&self, id: HandlerId) -> Option<&HandlerMeta> {
        self.handlers.get(id.index())
    }

    pub fn handlers(&self) -> &[HandlerMeta] {
        &self.handlers
    }
}

/// The innermost application: turns one HTTP exchange into one response.
pub struct Dispatcher {
    table: Arc<RouteTable>,
    pool: Arc<LazyPool>,
    debug: bool,
}

impl Dispatcher {
    pub fn new(table: Arc<RouteTable>, pool: Arc<LazyPool>, debug: bool) -> Self {
        Self { table, pool, debug }
    }

    /// Wrap this dispatcher as a [`GatewayApp`].
    pub fn into_app(self) -> GatewayApp {
        let this = Arc::new(self);
        app_fn(move |scope, receive, send| {
            let this = Arc::clone(&this);
            async move { this.dispatch(scope, receive, send).await }
        })
    }

    /// Serve one exchange.
    ///
    /// Handler failures and panics become a 500 and never escape; only a
    /// transport failure while sending is returned.
    pub async fn dispatch(
        &self,
        scope: Scope,
        receive: Receiver,
        send: Sender,
    ) -> Result<(), GatewayError> {
        match scope.kind {
            ScopeKind::Http => {}
            ScopeKind::Lifespan => return lifespan::respond(&receive, &send).await,
            ScopeKind::Other(ref kind) => {
                debug!(kind = %kind, "ignoring unsupported scope");
                return Ok(());
            }
        }

        let Some(found) = self.table.router().lookup(&scope.method, &scope.path) else {
            debug!(method = %scope.method, path = %scope.path, "no route matched");
            return Response::not_found().send(&send).await;
        };

        let Some(meta) = self.table.handler(*found.route.handler()) else {
            error!(id = %found.route.handler(), "route points at unknown handler");
            return Response::internal_error().send(&send).await;
        };

        debug!(
            handler = %meta.name,
            route = found.route.path(),
            mode = %meta.mode,
            "route matched"
        );

        let method = scope.method.clone();
        let path = scope.path.clone();
        let args = build_args(meta, found.params, scope, receive);

        let outcome = match &meta.handler {
            Handler::Cooperative(f) => run_cooperative(f.as_ref(), args).await,
            Handler::Blocking(f) => {
                let f = Arc::clone(f);
                match self.pool.get().execute(move || f(args)).await {
                    Ok(result) => result,
                    Err(PoolError::WorkerPanic(msg)) => {
                        Err(HandlerError::msg(format!("handler panicked: {}", msg)))
                    }
                    Err(e) if e.is_rejection() => {
                        warn!(handler = %meta.name, error = %e, "blocking pool rejected request");
                        return Response::service_unavailable().send(&send).await;
                    }
                    Err(e) => Err(HandlerError::from(e)),
                }
            }
        };

        let response = match outcome {
            Ok(reply) => reply.into_response(),
            Err(err) => {
                error!(
                    handler = %meta.name,
                    method = %method,
                    path = %path,
                    error = %err,
                    "handler failed"
                );
                if self.debug {
                    Response::internal_error_with_trace(&err.trace())
                } else {
                    Response::internal_error()
                }
            }
        };

        response.send(&send).await
    }
}

/// Accepted path parameters plus, when declared, the request.
fn build_args(meta: &HandlerMeta, params: PathParams, scope: Scope, receive: Receiver) -> Args {
    let accepted: PathParams = params
        .iter()
        .filter(|(name, _)| meta.params.contains(name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let request = meta
        .wants_request
        .then(|| Request::new(scope, receive, params));

    Args::new(accepted, request)
}

/// Await a cooperative handler, containing panics raised either while
/// building its future or while polling it.
async fn run_cooperative(
    f: &(dyn Fn(Args) -> futures_util::future::BoxFuture<'static, HandlerResult> + Send + Sync),
    args: Args,
) -> HandlerResult {
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| f(args))) {
        Ok(fut) => fut,
        Err(payload) => return Err(HandlerError::from_panic(payload)),
    };

    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(HandlerError::from_panic(payload)),
    }
}
