use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use utils::version;

use crate::api::ServerConfig;
use crate::collector::CollectorConfig;

/// Container GPU monitor exporting pod-attributed GPU memory metrics
#[derive(Debug, Clone, Parser)]
#[command(name = "cmpp", about, long_about = None, version = &**version::VERSION)]
pub struct DaemonArgs {
    #[arg(
        long,
        env = "CMPP_HOST",
        default_value = crate::api::DEFAULT_HOST,
        help = "Address to listen on"
    )]
    pub host: String,

    #[arg(
        long,
        env = "CMPP_PORT",
        default_value_t = crate::api::DEFAULT_PORT,
        help = "Port to listen on"
    )]
    pub port: u16,

    #[arg(
        long,
        env = "CMPP_INTERVAL",
        default_value_t = crate::collector::DEFAULT_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between collection cycles"
    )]
    pub interval: u64,

    #[arg(
        long,
        env = "CMPP_METRICS_FILE",
        value_hint = clap::ValueHint::FilePath,
        default_value = crate::collector::DEFAULT_METRICS_FILE,
        help = "File the latest snapshot is written to"
    )]
    pub metrics_file: PathBuf,

    #[arg(
        long,
        env = "CMPP_LOG_FILE",
        value_hint = clap::ValueHint::FilePath,
        default_value = crate::logging::DEFAULT_LOG_FILE,
        help = "Log file, falls back to /tmp/cm-purplepill.log when unwritable"
    )]
    pub log_file: PathBuf,

    #[arg(
        long,
        env = "CMPP_HOSTNAME_OVERRIDE",
        help = "Value of the Hostname label (defaults to the system hostname)"
    )]
    pub hostname_override: Option<String>,

    #[arg(
        long,
        env = "CMPP_NVIDIA_SMI",
        value_hint = clap::ValueHint::CommandName,
        default_value = crate::inventory::DEFAULT_NVIDIA_SMI,
        help = "nvidia-smi executable"
    )]
    pub nvidia_smi: String,

    #[arg(
        long,
        env = "CMPP_COMMAND_TIMEOUT",
        default_value_t = crate::inventory::DEFAULT_COMMAND_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds before an nvidia-smi invocation is killed"
    )]
    pub command_timeout: u64,

    #[arg(
        long,
        env = "CMPP_PROC_ROOT",
        value_hint = clap::ValueHint::DirPath,
        default_value = crate::identity::DEFAULT_PROC_ROOT,
        help = "Mount point of the host proc filesystem"
    )]
    pub proc_root: PathBuf,
}

impl DaemonArgs {
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig::new(self.interval, self.metrics_file.clone(), self.hostname())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }

    /// The override when set and non-empty, otherwise the system hostname.
    pub fn hostname(&self) -> String {
        if let Some(name) = self.hostname_override.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read system hostname");
                "unknown".to_string()
            }
        }
    }
}
