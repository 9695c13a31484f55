use tracing::warn;

use super::split_row;
use super::strip_unit;
use super::DeviceRecord;

const DEVICE_FIELDS: usize = 7;

/// Parses `--query-gpu` CSV output, one device per row.
///
/// Malformed rows are skipped with a warning; the remaining rows are kept in
/// input order.
pub fn parse_devices(output: &str) -> Vec<DeviceRecord> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let record = parse_device_row(line);
            if record.is_none() {
                warn!(row = line, "Skipping malformed GPU row");
            }
            record
        })
        .collect()
}

fn parse_device_row(line: &str) -> Option<DeviceRecord> {
    let fields = split_row(line);
    if fields.len() < DEVICE_FIELDS {
        return None;
    }

    let utilization_percent = strip_unit(fields[6], "%").parse::<u32>().ok()?;
    if utilization_percent > 100 {
        return None;
    }

    Some(DeviceRecord {
        index: fields[0].parse().ok()?,
        uuid: fields[1].to_string(),
        name: fields[2].to_string(),
        memory_total_mib: strip_unit(fields[3], "MiB").parse().ok()?,
        memory_used_mib: strip_unit(fields[4], "MiB").parse().ok()?,
        memory_free_mib: strip_unit(fields[5], "MiB").parse().ok()?,
        utilization_percent,
    })
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    fn device(index: u32, uuid: &str, name: &str, mem: [u64; 3], util: u32) -> DeviceRecord {
        DeviceRecord {
            index,
            uuid: uuid.to_string(),
            name: name.to_string(),
            memory_total_mib: mem[0],
            memory_used_mib: mem[1],
            memory_free_mib: mem[2],
            utilization_percent: util,
        }
    }

    #[test]
    fn parses_rows_in_order_with_units_stripped() {
        let output = "\
0, GPU-11111111-2222-3333-4444-555555555555, NVIDIA A100-SXM4-80GB, 81920 MiB, 1024 MiB, 80896 MiB, 3 %
1, GPU-66666666-7777-8888-9999-000000000000, NVIDIA A100-SXM4-80GB, 81920 MiB, 40960 MiB, 40960 MiB, 97 %
";
        let devices = parse_devices(output);

        assert_eq!(
            devices,
            vec![
                device(
                    0,
                    "GPU-11111111-2222-3333-4444-555555555555",
                    "NVIDIA A100-SXM4-80GB",
                    [81920, 1024, 80896],
                    3
                ),
                device(
                    1,
                    "GPU-66666666-7777-8888-9999-000000000000",
                    "NVIDIA A100-SXM4-80GB",
                    [81920, 40960, 40960],
                    97
                ),
            ]
        );
    }

    #[test]
    fn accepts_output_without_units() {
        let devices = parse_devices("0, GPU-abc, TestGPU, 8192, 2048, 6144, 25\n");
        assert_eq!(
            devices,
            vec![device(0, "GPU-abc", "TestGPU", [8192, 2048, 6144], 25)]
        );
    }

    #[test]
    fn skips_short_and_non_numeric_rows_without_aborting() {
        let output = "\
0, GPU-a, TestGPU, 8192 MiB, 2048 MiB, 6144 MiB, 25 %
1, GPU-b, TestGPU, 8192 MiB, 2048 MiB
2, GPU-c, TestGPU, [N/A], 2048 MiB, 6144 MiB, 25 %
3, GPU-d, TestGPU, 8192 MiB, 2048 MiB, 6144 MiB, [Not Supported]

4, GPU-e, TestGPU, 8192 MiB, 0 MiB, 8192 MiB, 0 %
";
        let uuids: Vec<_> = parse_devices(output).into_iter().map(|d| d.uuid).collect();
        assert_eq!(uuids, vec!["GPU-a", "GPU-e"]);
    }

    #[test]
    fn rejects_out_of_range_utilization_and_bad_index() {
        assert!(parse_devices("0, GPU-a, TestGPU, 1 MiB, 1 MiB, 0 MiB, 101 %").is_empty());
        assert!(parse_devices("x, GPU-a, TestGPU, 1 MiB, 1 MiB, 0 MiB, 1 %").is_empty());
    }

    #[test]
    fn empty_output_yields_no_devices() {
        assert!(parse_devices("").is_empty());
        assert!(parse_devices("\n\n").is_empty());
    }
}
