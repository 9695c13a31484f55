//! Wires the components together and keeps them alive until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;

use crate::api::MetricsServer;
use crate::collector::Collector;
use crate::collector::SnapshotStore;
use crate::config::DaemonArgs;
use crate::identity::IdentityResolver;
use crate::identity::ProcFs;
use crate::inventory::CommandRunner;
use crate::inventory::GpuInventory;
use crate::inventory::SystemCommandRunner;

/// How often component liveness is checked.
pub const SUPERVISE_INTERVAL: Duration = Duration::from_secs(5);

pub struct Application {
    inventory: GpuInventory,
    collector: Collector,
    server: MetricsServer,
}

impl Application {
    /// Builds the application around the real `nvidia-smi` and `/proc`.
    pub fn build(args: &DaemonArgs) -> Self {
        let runner = Arc::new(SystemCommandRunner::new(args.command_timeout()));
        Self::with_runner(args, runner)
    }

    pub fn with_runner(args: &DaemonArgs, runner: Arc<dyn CommandRunner>) -> Self {
        let inventory = GpuInventory::new(runner, args.nvidia_smi.clone());
        let resolver = IdentityResolver::new(Arc::new(ProcFs::new(args.proc_root.clone())));
        let store = SnapshotStore::new();

        let collector_config = args.collector_config();
        tracing::info!(
            hostname = %collector_config.hostname,
            interval = ?collector_config.interval,
            metrics_file = %collector_config.metrics_file.display(),
            "Collector configured"
        );

        Self {
            collector: Collector::new(collector_config, inventory.clone(), resolver, store.clone()),
            server: MetricsServer::new(args.server_config(), store),
            inventory,
        }
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(&self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Probes the GPU tool, starts the collector and the server, and restarts
    /// either of them if it dies before `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// - the GPU tool cannot be executed
    /// - the listen address cannot be bound
    /// - the signal handlers cannot be installed
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let version = self
            .inventory
            .probe()
            .await
            .context("nvidia-smi is not available")?;
        tracing::info!(%version, "Found GPU query tool");

        self.collector.start();
        if let Err(report) = self.server.start().await {
            self.collector.stop().await;
            return Err(anyhow::anyhow!("{report:?}")).context("Failed to start metrics server");
        }

        let result = self.supervise_until(shutdown).await;
        self.shutdown().await;
        result
    }

    async fn supervise_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(SUPERVISE_INTERVAL);
        ticker.tick().await;

        loop {
            tokio::select! {
                result = &mut shutdown => {
                    return result.context("Failed to wait for shutdown signal");
                }
                _ = ticker.tick() => self.supervise().await,
            }
        }
    }

    /// Restarts whichever component is no longer running.
    pub async fn supervise(&self) {
        if !self.collector.is_running() {
            tracing::warn!("Collector loop is not running, restarting");
            self.collector.start();
        }
        if !self.server.is_running().await {
            tracing::warn!("Metrics server is not running, restarting");
            if let Err(report) = self.server.start().await {
                tracing::error!(error = ?report, "Failed to restart metrics server");
            }
        }
    }

    pub async fn shutdown(&self) {
        tracing::info!("Shutting down");
        self.server.stop().await;
        self.collector.stop().await;
        tracing::info!("Shutdown completed");
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn server(&self) -> &MetricsServer {
        &self.server
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr().await
    }
}

/// Resolves on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        Ok(())
    }
}
