//! The periodic collection loop and the snapshot it publishes.

mod persist;
mod snapshot;

use core::error::Error;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use derive_more::Display;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing::Span;

pub use persist::staging_path;
pub use persist::write_atomic;
pub use persist::PersistError;
pub use snapshot::SnapshotStore;

use crate::identity::IdentityResolver;
use crate::identity::PodIdentity;
use crate::inventory::DeviceRecord;
use crate::inventory::GpuInventory;
use crate::inventory::InventoryError;
use crate::inventory::ProcessRecord;
use crate::lifecycle::BackgroundTask;
use crate::lifecycle::StartOutcome;
use crate::lifecycle::STOP_TIMEOUT;
use crate::metrics;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_METRICS_FILE: &str = "/tmp/cmpp_metrics.prom";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    pub interval: Duration,
    pub metrics_file: PathBuf,
    pub hostname: String,
}

impl CollectorConfig {
    /// `interval_secs` below one is raised to one.
    pub fn new(
        interval_secs: u64,
        metrics_file: impl Into<PathBuf>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs.max(1)),
            metrics_file: metrics_file.into(),
            hostname: hostname.into(),
        }
    }
}

/// Why a cycle did not fully complete.
#[derive(Debug, Display)]
pub enum CycleError {
    #[display("{_0}")]
    Inventory(InventoryError),
    #[display("snapshot published but not persisted: {_0}")]
    Persist(PersistError),
}

impl Error for CycleError {}

/// Samples the GPUs on a fixed interval and publishes each result to a
/// [`SnapshotStore`] and to the metrics file.
pub struct Collector {
    cycle: Arc<Cycle>,
    task: Mutex<Option<BackgroundTask>>,
}

struct Cycle {
    config: CollectorConfig,
    inventory: GpuInventory,
    resolver: IdentityResolver,
    store: SnapshotStore,
    span: Span,
}

impl Collector {
    pub fn new(
        config: CollectorConfig,
        inventory: GpuInventory,
        resolver: IdentityResolver,
        store: SnapshotStore,
    ) -> Self {
        let span = tracing::info_span!("collector", hostname = %config.hostname);
        Self {
            cycle: Arc::new(Cycle {
                config,
                inventory,
                resolver,
                store,
                span,
            }),
            task: Mutex::new(None),
        }
    }

    /// Handle to the published snapshot.
    pub fn snapshot(&self) -> SnapshotStore {
        self.cycle.store.clone()
    }

    /// Spawns the loop. The first cycle runs immediately.
    pub fn start(&self) -> StartOutcome {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(BackgroundTask::is_alive) {
            return StartOutcome::AlreadyRunning;
        }

        let token = CancellationToken::new();
        let cycle = Arc::clone(&self.cycle);
        let span = cycle.span.clone();
        let handle = tokio::spawn(cycle.run(token.clone()).instrument(span));
        *task = Some(BackgroundTask::new(token, handle));
        StartOutcome::Started
    }

    /// Stops the loop, letting an in-flight cycle finish within [`STOP_TIMEOUT`].
    pub async fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.shutdown("collector", STOP_TIMEOUT).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(BackgroundTask::is_alive)
    }

    /// Runs a single cycle outside the loop.
    ///
    /// # Errors
    ///
    /// - [`CycleError::Inventory`] if devices could not be listed; nothing is published
    /// - [`CycleError::Persist`] if the new snapshot could not be written to disk
    pub async fn collect_once(&self) -> Result<(), CycleError> {
        self.cycle
            .collect()
            .instrument(self.cycle.span.clone())
            .await
    }
}

impl Cycle {
    async fn run(self: Arc<Self>, token: CancellationToken) {
        tracing::info!(interval = ?self.config.interval, "Collector loop started");
        loop {
            if let Err(e) = self.collect().await {
                tracing::error!(error = %e, "Collection cycle failed");
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
        tracing::info!("Collector loop stopped");
    }

    async fn collect(&self) -> Result<(), CycleError> {
        let devices = self
            .inventory
            .list_devices()
            .await
            .map_err(CycleError::Inventory)?;

        let processes = match self.inventory.list_processes().await {
            Ok(processes) => processes,
            Err(e) => {
                tracing::error!(error = %e, "Publishing device series without pod attribution");
                Vec::new()
            }
        };

        let identities = self.resolve_identities(&devices, &processes).await;
        let document: Arc<str> = metrics::format_snapshot(
            &devices,
            &processes,
            |pid| identities.get(&pid).cloned().unwrap_or_default(),
            &self.config.hostname,
        )
        .into();

        self.store.replace(Arc::clone(&document));
        tracing::debug!(
            devices = devices.len(),
            processes = processes.len(),
            attributed = identities.values().filter(|id| !id.is_empty()).count(),
            "Snapshot published"
        );

        write_atomic(&self.config.metrics_file, &document)
            .await
            .map_err(CycleError::Persist)
    }

    /// Resolves each pid once, skipping processes on devices outside this cycle.
    async fn resolve_identities(
        &self,
        devices: &[DeviceRecord],
        processes: &[ProcessRecord],
    ) -> HashMap<u32, PodIdentity> {
        let known: HashSet<&str> = devices.iter().map(|d| d.uuid.as_str()).collect();
        let mut identities = HashMap::new();
        for process in processes {
            if !known.contains(process.device_uuid.as_str())
                || identities.contains_key(&process.pid)
            {
                continue;
            }
            let identity = self.resolver.resolve(process.pid).await;
            identities.insert(process.pid, identity);
        }
        identities
    }
}
