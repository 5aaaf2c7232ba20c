use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::Router;
use oidc_op_core::{catch_panic_layer, default_trace};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Configuration, ProviderConfig};
use crate::error::ServeError;
use crate::provider::OpenIdProvider;
use crate::router::create_router;

/// The listener a provider is served on.
///
/// `listen_and_serve` runs until the listener fails or until `shutdown` has
/// been requested and in-flight requests have drained (or the drain has been
/// cut short). A requested shutdown resolves to `Ok(())`, anything else to an
/// error.
pub trait HttpServer: Send + Sync + 'static {
    fn listen_and_serve(&self, app: Router) -> impl Future<Output = Result<(), ServeError>> + Send;

    /// Stop accepting connections and wait for in-flight requests to finish.
    ///
    /// Implementations bound the wait; once it is over `listen_and_serve`
    /// must return even if requests are still running.
    fn shutdown(&self) -> impl Future<Output = Result<(), ServeError>> + Send;
}

/// Lifecycle of an [`AxumServer`]. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerState {
    NotStarted,
    Serving,
    ShuttingDown,
    Stopped,
}

/// [`HttpServer`] backed by `axum::serve` over a tokio `TcpListener`.
///
/// Shutdown drains in-flight requests for at most `grace`. After that the
/// serve loop is abandoned: the listener closes, connections still open are
/// left to their tasks, and the state moves to [`ServerState::Stopped`].
pub struct AxumServer {
    addr: String,
    grace: Duration,
    trigger: CancellationToken,
    hard_stop: CancellationToken,
    state: watch::Sender<ServerState>,
    local_addr: OnceLock<SocketAddr>,
}

impl AxumServer {
    pub fn new(addr: impl Into<String>, grace: Duration) -> Self {
        let (state, _) = watch::channel(ServerState::NotStarted);
        Self {
            addr: addr.into(),
            grace,
            trigger: CancellationToken::new(),
            hard_stop: CancellationToken::new(),
            state,
            local_addr: OnceLock::new(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.listen_addr(), config.shutdown_grace)
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// The bound address, once the listener is up. Resolves port `0`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Wait until the listener is bound (or has failed to bind).
    ///
    /// Returns the bound address, or `None` if the server stopped without
    /// ever accepting connections.
    pub async fn ready(&self) -> Option<SocketAddr> {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| *s >= ServerState::Serving).await;
        self.local_addr()
    }

    async fn serve(&self, app: Router) -> Result<(), ServeError> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|source| ServeError::Bind {
                addr: self.addr.clone(),
                source,
            })?;
        let local = listener.local_addr().map_err(ServeError::Serve)?;
        let _ = self.local_addr.set(local);
        self.state.send_if_modified(|s| {
            if *s == ServerState::NotStarted {
                *s = ServerState::Serving;
                true
            } else {
                false
            }
        });
        info!(addr = %local, "oidc server is listening");

        let trigger = self.trigger.clone();
        let serving = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { trigger.cancelled().await })
        .into_future();

        tokio::select! {
            result = serving => result.map_err(ServeError::Serve),
            _ = self.hard_stop.cancelled() => {
                warn!(grace = ?self.grace, "in-flight requests did not drain, oidc server stopped");
                Ok(())
            }
        }
    }
}

impl HttpServer for AxumServer {
    async fn listen_and_serve(&self, app: Router) -> Result<(), ServeError> {
        let result = self.serve(app).await;
        self.state.send_replace(ServerState::Stopped);
        result
    }

    async fn shutdown(&self) -> Result<(), ServeError> {
        self.state.send_if_modified(|s| match s {
            ServerState::NotStarted | ServerState::Serving => {
                *s = ServerState::ShuttingDown;
                true
            }
            _ => false,
        });
        self.trigger.cancel();

        let mut rx = self.state.subscribe();
        let drained = tokio::time::timeout(self.grace, rx.wait_for(|s| *s == ServerState::Stopped))
            .await
            .is_ok();
        if drained {
            return Ok(());
        }

        self.hard_stop.cancel();
        // A running serve loop reacts to the hard stop at once.
        let _ = tokio::time::timeout(
            Duration::from_millis(100),
            rx.wait_for(|s| *s == ServerState::Stopped),
        )
        .await;
        Err(ServeError::ShutdownTimeout(self.grace))
    }
}

/// Handle on a provider started with [`start`].
pub struct ServerHandle {
    serve: JoinHandle<Result<(), ServeError>>,
    watcher: JoinHandle<()>,
}

impl ServerHandle {
    /// Whether the serve loop has ended.
    pub fn is_finished(&self) -> bool {
        self.serve.is_finished()
    }

    /// Wait for the serve loop and the shutdown watcher to end.
    ///
    /// `Ok(())` after a requested shutdown, the serve-loop error otherwise.
    pub async fn wait(self) -> Result<(), ServeError> {
        let served = match self.serve.await {
            Ok(result) => result,
            Err(join) => Err(ServeError::Serve(std::io::Error::other(join))),
        };
        let _ = self.watcher.await;
        served
    }
}

/// Start serving `provider` in the background and return immediately.
///
/// The router from [`create_router`] is merged with the provider's
/// additional routes and wrapped in the trace and panic layers. When `token`
/// is cancelled the provider's server is asked to shut down exactly once.
/// A failing shutdown is logged; a failing serve loop is logged and
/// reported through [`ServerHandle::wait`].
///
/// Must be called from within a tokio runtime.
pub fn start<P: OpenIdProvider>(token: CancellationToken, provider: Arc<P>) -> ServerHandle {
    let app = create_router(Arc::clone(&provider))
        .merge(provider.additional_routes())
        .layer(catch_panic_layer())
        .layer(default_trace());
    debug!(addr = %provider.config().listen_addr(), "Starting oidc server");

    let serve_done = CancellationToken::new();

    let watcher = {
        let provider = Arc::clone(&provider);
        let serve_done = serve_done.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = serve_done.cancelled() => return,
            }
            info!("Shutdown requested, draining oidc server");
            match provider.http_server().shutdown().await {
                Ok(()) => info!("oidc server stopped"),
                Err(e) => error!(error = %e, "graceful shutdown of oidc server failed"),
            }
        })
    };

    let serve = tokio::spawn(async move {
        let result = provider.http_server().listen_and_serve(app).await;
        if let Err(e) = &result {
            error!(error = %e, "oidc server serve failed");
        }
        serve_done.cancel();
        result
    });

    ServerHandle { serve, watcher }
}
