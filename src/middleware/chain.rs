//! Ordered middleware list with a cached composition.

use std::fmt;
use std::sync::Arc;

use super::Middleware;
use crate::gateway::GatewayApp;

/// Middleware in registration order plus the composed app built from them.
///
/// The composition is built on first use and reused until the chain
/// changes.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
    composed: Option<GatewayApp>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware and drop any cached composition.
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        tracing::debug!(middleware = middleware.name(), "middleware added");
        self.layers.push(Arc::new(middleware));
        self.composed = None;
    }

    /// Drop the cached composition.
    pub fn invalidate(&mut self) {
        self.composed = None;
    }

    /// The cached composition, if it is current.
    pub fn cached(&self) -> Option<GatewayApp> {
        self.composed.clone()
    }

    /// Wrap `inner` with every layer, first-registered outermost, and cache
    /// the result. Returns the cached app when it is still current.
    pub fn compose(&mut self, inner: GatewayApp) -> GatewayApp {
        if let Some(app) = &self.composed {
            return app.clone();
        }

        let app = self
            .layers
            .iter()
            .rev()
            .fold(inner, |app, layer| layer.wrap(app));
        self.composed = Some(app.clone());
        app
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Middleware names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|m| m.name()).collect()
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("layers", &self.names())
            .field("composed", &self.composed.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{app_fn, append_header, Message, Receiver, Scope, Sender};
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    fn endpoint() -> GatewayApp {
        app_fn(|_scope, _receive, send: Sender| async move {
            send.send(Message::ResponseStart {
                status: StatusCode::OK,
                headers: Vec::new(),
            })
            .await?;
            send.send(Message::body("ok")).await
        })
    }

    /// Records its tag on the way in and appends `x-seen-by: <tag>` on the way out.
    fn tagging(tag: &'static str, seen: Arc<Mutex<Vec<&'static str>>>) -> impl Middleware {
        move |inner: GatewayApp| {
            let seen = Arc::clone(&seen);
            app_fn(move |scope, receive, send: Sender| {
                seen.lock().unwrap().push(tag);
                let inner = inner.clone();
                let send = send.map(move |msg| append_header(msg, "x-seen-by", tag));
                async move { inner(scope, receive, send).await }
            })
        }
    }

    async fn call(app: &GatewayApp) -> Vec<(String, String)> {
        let (tx, mut rx) = mpsc::channel(8);
        app(Scope::http("GET", "/"), Receiver::disconnected(), Sender::channel(tx))
            .await
            .unwrap();

        match rx.recv().await {
            Some(Message::ResponseStart { headers, .. }) => headers
                .iter()
                .map(|(k, v)| {
                    (
                        String::from_utf8_lossy(k).into_owned(),
                        String::from_utf8_lossy(v).into_owned(),
                    )
                })
                .collect(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_registered_is_outermost() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.add(tagging("m1", Arc::clone(&seen)));
        chain.add(tagging("m2", Arc::clone(&seen)));

        let app = chain.compose(endpoint());
        let headers = call(&app).await;

        // m1 sees the request first
        assert_eq!(*seen.lock().unwrap(), vec!["m1", "m2"]);
        // m2 rewrites the start message before it reaches m1's sender
        assert_eq!(
            headers,
            vec![
                ("x-seen-by".to_string(), "m2".to_string()),
                ("x-seen-by".to_string(), "m1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_composition_is_cached() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counting = {
            let builds = Arc::clone(&builds);
            move |inner: GatewayApp| {
                builds.fetch_add(1, Ordering::SeqCst);
                inner
            }
        };

        let mut chain = MiddlewareChain::new();
        chain.add(counting);

        let first = chain.compose(endpoint());
        let second = chain.compose(endpoint());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_add_invalidates_cache() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.add(tagging("m1", Arc::clone(&seen)));

        let before = chain.compose(endpoint());
        assert!(chain.cached().is_some());

        chain.add(tagging("m2", Arc::clone(&seen)));
        assert!(chain.cached().is_none());

        let after = chain.compose(endpoint());
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(call(&after).await.len(), 2);
    }

    #[test]
    fn test_empty_chain_returns_inner() {
        let mut chain = MiddlewareChain::new();
        let inner = endpoint();
        let app = chain.compose(inner.clone());
        assert!(Arc::ptr_eq(&inner, &app));
        assert!(chain.is_empty());
        assert_eq!(chain.names(), Vec::<&str>::new());
    }
}
