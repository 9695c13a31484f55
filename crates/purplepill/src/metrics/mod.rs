//! Formats one collection cycle into an exposition document.

mod exposition;

use std::collections::HashMap;

pub use exposition::ExpositionWriter;
pub use exposition::Gauge;

use crate::identity::PodIdentity;
use crate::inventory::DeviceRecord;
use crate::inventory::ProcessRecord;

pub const GPU_MEMORY_TOTAL: Gauge = Gauge {
    name: "CM_PURPLEPILL_GPU_MEMORY_TOTAL_MIB",
    help: "Total GPU memory in MiB.",
};

pub const GPU_MEMORY_USED: Gauge = Gauge {
    name: "CM_PURPLEPILL_GPU_MEMORY_USED_TOTAL_MIB",
    help: "Total used GPU memory in MiB.",
};

pub const GPU_MEMORY_FREE: Gauge = Gauge {
    name: "CM_PURPLEPILL_GPU_MEMORY_FREE_MIB",
    help: "Free GPU memory in MiB.",
};

pub const GPU_UTILIZATION: Gauge = Gauge {
    name: "CM_PURPLEPILL_GPU_UTILIZATION",
    help: "GPU utilization percentage.",
};

pub const GPU_MEMORY_USED_POD: Gauge = Gauge {
    name: "CM_PURPLEPILL_GPU_MEMORY_USED_POD_MIB",
    help: "Pod GPU memory usage in MiB.",
};

/// Renders devices and pod-attributed processes as one document.
///
/// Device families come first, each with one series per device, followed by
/// the pod family. A process is skipped when its device UUID is not among
/// `devices` or when `resolve` returns an empty identity. Series follow input
/// order, so identical inputs give identical output.
pub fn format_snapshot<F>(
    devices: &[DeviceRecord],
    processes: &[ProcessRecord],
    resolve: F,
    hostname: &str,
) -> String
where
    F: Fn(u32) -> PodIdentity,
{
    let mut writer = ExpositionWriter::new();

    let device_families: [(Gauge, fn(&DeviceRecord) -> u64); 4] = [
        (GPU_MEMORY_TOTAL, |d| d.memory_total_mib),
        (GPU_MEMORY_USED, |d| d.memory_used_mib),
        (GPU_MEMORY_FREE, |d| d.memory_free_mib),
        (GPU_UTILIZATION, |d| u64::from(d.utilization_percent)),
    ];

    for (gauge, value) in device_families {
        writer.family(gauge);
        for device in devices {
            let index = device.index.to_string();
            let labels = [
                ("gpu", index.as_str()),
                ("UUID", device.uuid.as_str()),
                ("modelName", device.name.as_str()),
                ("Hostname", hostname),
            ];
            writer.sample(gauge, &labels, value(device));
        }
    }

    writer.family(GPU_MEMORY_USED_POD);

    let mut by_uuid: HashMap<&str, &DeviceRecord> = HashMap::with_capacity(devices.len());
    for device in devices {
        by_uuid.entry(device.uuid.as_str()).or_insert(device);
    }

    for process in processes {
        let Some(device) = by_uuid.get(process.device_uuid.as_str()) else {
            tracing::debug!(
                pid = process.pid,
                uuid = %process.device_uuid,
                "Process references a GPU missing from this cycle"
            );
            continue;
        };

        let identity = resolve(process.pid);
        if identity.is_empty() {
            continue;
        }

        let index = device.index.to_string();
        let device_name = format!("nvidia{index}");
        let mut labels = vec![
            ("gpu", index.as_str()),
            ("UUID", process.device_uuid.as_str()),
            ("Hostname", hostname),
            ("device", device_name.as_str()),
        ];
        let identity_labels = [
            ("pod", &identity.pod_name),
            ("namespace", &identity.namespace),
            ("stack_id", &identity.stack_id),
            ("container_id", &identity.container_id),
        ];
        labels.extend(
            identity_labels
                .iter()
                .filter_map(|(key, value)| value.as_deref().map(|v| (*key, v))),
        );

        writer.sample(GPU_MEMORY_USED_POD, &labels, process.memory_used_mib);
    }

    writer.finish()
}
