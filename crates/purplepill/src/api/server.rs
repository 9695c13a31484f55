use std::net::SocketAddr;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use poem::get;
use poem::listener::Acceptor;
use poem::listener::Listener;
use poem::listener::TcpListener;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::Instrument;
use tracing::Span;

use super::errors::ServerError;
use super::handlers::get_health;
use super::handlers::get_metrics;
use crate::collector::SnapshotStore;
use crate::lifecycle::BackgroundTask;
use crate::lifecycle::StartOutcome;
use crate::lifecycle::STOP_TIMEOUT;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9531;

/// Grace period for in-flight requests once shutdown is requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Routes serving `snapshot`: `/` and `/metrics` return it, `/health` returns `OK`.
pub fn routes(snapshot: SnapshotStore) -> impl Endpoint {
    Route::new()
        .at("/", get(get_metrics))
        .at("/metrics", get(get_metrics))
        .at("/health", get(get_health))
        .data(snapshot)
}

struct Running {
    task: BackgroundTask,
    local_addr: Option<SocketAddr>,
}

/// HTTP server exposing the latest snapshot
pub struct MetricsServer {
    config: ServerConfig,
    snapshot: SnapshotStore,
    span: Span,
    running: Mutex<Option<Running>>,
}

impl MetricsServer {
    pub fn new(config: ServerConfig, snapshot: SnapshotStore) -> Self {
        let span = tracing::info_span!("metrics_server", addr = %config.listen_addr());
        Self {
            config,
            snapshot,
            span,
            running: Mutex::new(None),
        }
    }

    /// Binds the listen address and starts serving in the background.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Bind`] if the address cannot be resolved or bound
    pub async fn start(&self) -> Result<StartOutcome, Report<ServerError>> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| r.task.is_alive()) {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let addr = self.config.listen_addr();
        let acceptor = TcpListener::bind(addr.clone())
            .into_acceptor()
            .await
            .map_err(|e| {
                Report::new(ServerError::Bind {
                    addr: addr.clone(),
                    message: e.to_string(),
                })
            })
            .attach_printable_lazy(|| {
                format!("host={} port={}", self.config.host, self.config.port)
            })?;

        let local_addr = acceptor
            .local_addr()
            .first()
            .and_then(|a| a.as_socket_addr())
            .copied();
        info!(parent: &self.span, ?local_addr, "Serving metrics");

        let token = CancellationToken::new();
        let shutdown = token.clone();
        let app = routes(self.snapshot.clone());
        let handle = tokio::spawn(
            async move {
                let result = Server::new_with_acceptor(acceptor)
                    .run_with_graceful_shutdown(
                        app,
                        async move { shutdown.cancelled().await },
                        Some(DRAIN_TIMEOUT),
                    )
                    .await;
                match result {
                    Ok(()) => info!("Metrics server stopped"),
                    Err(e) => error!(error = %e, "Metrics server failed"),
                }
            }
            .instrument(self.span.clone()),
        );

        *running = Some(Running {
            task: BackgroundTask::new(token, handle),
            local_addr,
        });
        Ok(StartOutcome::Started)
    }

    pub async fn stop(&self) {
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            running.task.shutdown("metrics_server", STOP_TIMEOUT).await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| r.task.is_alive())
    }

    /// Bound address while running; useful when configured with port 0.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().and_then(|r| r.local_addr)
    }
}
