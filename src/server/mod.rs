//! HTTP transport for an [`Application`].
//!
//! Accepts TCP connections, speaks HTTP/1.1 and HTTP/2 through hyper's auto
//! builder and turns every request into one gateway exchange.
//!
//! # Example
//!
//! ```rust,ignore
//! use blazeapi::config::ServerConfig;
//! use blazeapi::server::Server;
//!
//! let server = Server::new(ServerConfig::default(), Arc::new(app));
//! server.run().await?;
//! ```
//!
//! # Lifecycle
//!
//! 1. Lifespan startup handshake with the application.
//! 2. Accept loop until the shutdown future resolves.
//! 3. In-flight connections drain, bounded by `drain_timeout`.
//! 4. Lifespan shutdown handshake, then the blocking pool stops.

pub mod connection;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::app::Application;
use crate::config::ServerConfig;
use crate::gateway::{GatewayApp, GatewayError, Message, Receiver, Scope, Sender};

use connection::{handle_request, is_connection_error};

/// HTTP server driving one [`Application`].
pub struct Server {
    config: ServerConfig,
    app: Arc<Application>,
}

impl Server {
    pub fn new(config: ServerConfig, app: Arc<Application>) -> Self {
        Self { config, app }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind `listen_addr` and serve until Ctrl-C or SIGTERM.
    pub async fn run(self) -> io::Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        info!("Listening on http://{}", listener.local_addr()?);
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve connections from `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let gateway = Arc::clone(&self.app).gateway();
        let lifespan = Lifespan::startup(&gateway).await;

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(Some(self.config.header_timeout))
            .keep_alive(true);
        builder.http2().max_concurrent_streams(250);

        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            continue;
                        }
                    };
                    let _ = stream.set_nodelay(true);

                    let gateway = gateway.clone();
                    let service = service_fn(move |req| handle_request(gateway.clone(), req, remote_addr));

                    let conn = builder.serve_connection(TokioIo::new(stream), service);
                    let conn = graceful.watch(conn.into_owned());
                    connections.spawn(async move {
                        if let Err(err) = conn.await {
                            let err_str = format!("{:?}", err);
                            if !is_connection_error(&err_str) {
                                debug!(client = %remote_addr, "Connection error: {}", err_str);
                            }
                        }
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = &mut shutdown => {
                    info!("Shutting down, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);

        match tokio::time::timeout(self.config.drain_timeout, graceful.shutdown()).await {
            Ok(()) => debug!("All connections drained"),
            Err(_) => {
                warn!(
                    timeout_secs = self.config.drain_timeout.as_secs(),
                    remaining = connections.len(),
                    "Drain timeout reached, closing remaining connections"
                );
                connections.abort_all();
            }
        }
        while connections.join_next().await.is_some() {}

        lifespan.shutdown().await;
        self.app.shutdown();
        info!("Server stopped");
        Ok(())
    }
}

/// A running lifespan exchange.
struct Lifespan {
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
    task: JoinHandle<Result<(), GatewayError>>,
}

impl Lifespan {
    async fn startup(gateway: &GatewayApp) -> Self {
        let (tx, app_rx) = mpsc::channel(1);
        let (app_tx, mut rx) = mpsc::channel(1);
        let task = tokio::spawn(gateway(
            Scope::lifespan(),
            Receiver::channel(app_rx),
            Sender::channel(app_tx),
        ));

        if tx.send(Message::Startup).await.is_ok() {
            match rx.recv().await {
                Some(Message::StartupComplete) => debug!("lifespan startup complete"),
                other => warn!(reply = ?other.as_ref().map(Message::kind), "unexpected lifespan startup reply"),
            }
        }

        Self { tx, rx, task }
    }

    async fn shutdown(mut self) {
        if self.tx.send(Message::Shutdown).await.is_ok() {
            match self.rx.recv().await {
                Some(Message::ShutdownComplete) => debug!("lifespan shutdown complete"),
                other => warn!(reply = ?other.as_ref().map(Message::kind), "unexpected lifespan shutdown reply"),
            }
        }

        drop(self.tx);
        match self.task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "lifespan exchange ended with error"),
            Err(e) => error!(error = %e, "lifespan task aborted"),
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Local address helper for tests and embedding: bind an ephemeral port.
pub async fn bind_ephemeral() -> io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    Ok((listener, addr))
}
