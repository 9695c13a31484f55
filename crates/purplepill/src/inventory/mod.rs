//! GPU and compute process inventory read from `nvidia-smi`.
//!
//! Both queries are independent point-in-time samples. A device may disappear
//! between the device query and the process query; correlation happens later
//! in the formatter, which drops processes without a matching device.

mod command;
mod devices;
mod processes;

use core::error::Error;
use std::sync::Arc;

use derive_more::Display;

pub use command::CommandError;
pub use command::CommandRunner;
pub use command::SystemCommandRunner;
pub use command::DEFAULT_COMMAND_TIMEOUT;
pub use devices::parse_devices;
pub use processes::parse_processes;

/// Default executable name of the GPU query tool.
pub const DEFAULT_NVIDIA_SMI: &str = "nvidia-smi";

const DEVICE_QUERY: [&str; 2] = [
    "--query-gpu=index,gpu_uuid,name,memory.total,memory.used,memory.free,utilization.gpu",
    "--format=csv,noheader",
];

const PROCESS_QUERY: [&str; 2] = [
    "--query-compute-apps=pid,gpu_uuid,used_memory",
    "--format=csv,noheader",
];

/// One physical GPU at a sample instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub index: u32,
    pub uuid: String,
    pub name: String,
    pub memory_total_mib: u64,
    pub memory_used_mib: u64,
    pub memory_free_mib: u64,
    pub utilization_percent: u32,
}

/// One compute process holding memory on a GPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub device_uuid: String,
    pub memory_used_mib: u64,
}

/// The tool could not be queried; the affected record set is empty for this cycle.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[display("device query failed: {_0}")]
    Devices(CommandError),
    #[display("process query failed: {_0}")]
    Processes(CommandError),
    #[display("GPU query tool unavailable: {_0}")]
    Unavailable(CommandError),
}

impl Error for InventoryError {}

/// Reads device and process inventory through a [`CommandRunner`].
#[derive(Clone)]
pub struct GpuInventory {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl GpuInventory {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Lists all GPUs in tool order.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::Devices`] if the tool is missing, fails or times out
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, InventoryError> {
        let output = self
            .runner
            .run(&self.program, &DEVICE_QUERY)
            .await
            .map_err(InventoryError::Devices)?;
        Ok(parse_devices(&output))
    }

    /// Lists compute processes currently holding GPU memory.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::Processes`] if the tool is missing, fails or times out
    pub async fn list_processes(&self) -> Result<Vec<ProcessRecord>, InventoryError> {
        let output = self
            .runner
            .run(&self.program, &PROCESS_QUERY)
            .await
            .map_err(InventoryError::Processes)?;
        Ok(parse_processes(&output))
    }

    /// Checks that the tool can be executed at all.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::Unavailable`] if `--version` cannot be run successfully
    pub async fn probe(&self) -> Result<String, InventoryError> {
        self.runner
            .run(&self.program, &["--version"])
            .await
            .map(|output| output.lines().next().unwrap_or_default().trim().to_string())
            .map_err(InventoryError::Unavailable)
    }
}

/// Splits one CSV row into trimmed fields.
fn split_row(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

/// Removes a trailing unit such as `MiB` or `%` from an already trimmed field.
fn strip_unit<'a>(field: &'a str, unit: &str) -> &'a str {
    field
        .strip_suffix(unit)
        .map(str::trim_end)
        .unwrap_or(field)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    /// Replies with canned output keyed by the first argument.
    #[derive(Default)]
    struct ScriptedRunner {
        replies: HashMap<&'static str, Result<String, CommandError>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
            let mut call = vec![program.to_string()];
            call.extend(args.iter().map(|a| a.to_string()));
            self.calls.lock().unwrap().push(call);
            self.replies
                .get(args[0])
                .cloned()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    #[test]
    fn strip_unit_removes_known_suffixes() {
        assert_eq!(strip_unit("8192 MiB", "MiB"), "8192");
        assert_eq!(strip_unit("25 %", "%"), "25");
        assert_eq!(strip_unit("25", "%"), "25");
        assert_eq!(strip_unit("[N/A]", "MiB"), "[N/A]");
    }

    #[test(tokio::test)]
    async fn list_devices_uses_device_query() {
        let mut runner = ScriptedRunner::default();
        runner.replies.insert(
            DEVICE_QUERY[0],
            Ok("0, GPU-abc, TestGPU, 8192 MiB, 2048 MiB, 6144 MiB, 25 %\n".to_string()),
        );
        let runner = Arc::new(runner);
        let inventory = GpuInventory::new(runner.clone(), "/usr/bin/nvidia-smi");

        let devices = inventory.list_devices().await.unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].uuid, "GPU-abc");
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0][0], "/usr/bin/nvidia-smi");
        assert_eq!(calls[0][2], "--format=csv,noheader");
    }

    #[test(tokio::test)]
    async fn list_processes_surfaces_tool_failure() {
        let mut runner = ScriptedRunner::default();
        let failure = CommandError::TimedOut {
            program: "nvidia-smi".to_string(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        };
        runner
            .replies
            .insert(PROCESS_QUERY[0], Err(failure.clone()));
        let inventory = GpuInventory::new(Arc::new(runner), DEFAULT_NVIDIA_SMI);

        let err = inventory.list_processes().await.unwrap_err();

        assert_eq!(err, InventoryError::Processes(failure));
    }

    #[test(tokio::test)]
    async fn probe_reports_first_line_of_version_output() {
        let mut runner = ScriptedRunner::default();
        runner.replies.insert(
            "--version",
            Ok("NVIDIA-SMI version  : 550.54.15\nNVML version : 550.54\n".to_string()),
        );
        let inventory = GpuInventory::new(Arc::new(runner), DEFAULT_NVIDIA_SMI);

        let version = inventory.probe().await.unwrap();

        assert_eq!(version, "NVIDIA-SMI version  : 550.54.15");
    }
}
