use tracing::warn;

use super::split_row;
use super::strip_unit;
use super::ProcessRecord;

const PROCESS_FIELDS: usize = 3;

/// Parses `--query-compute-apps` CSV output, one process per row.
///
/// Rows with a non-positive or non-numeric pid, or a non-numeric memory value
/// (`[N/A]` under some virtualised setups), are skipped with a warning.
pub fn parse_processes(output: &str) -> Vec<ProcessRecord> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let record = parse_process_row(line);
            if record.is_none() {
                warn!(row = line, "Skipping malformed GPU process row");
            }
            record
        })
        .collect()
}

fn parse_process_row(line: &str) -> Option<ProcessRecord> {
    let fields = split_row(line);
    if fields.len() < PROCESS_FIELDS {
        return None;
    }

    let pid = fields[0].parse::<u32>().ok().filter(|pid| *pid > 0)?;

    Some(ProcessRecord {
        pid,
        device_uuid: fields[1].to_string(),
        memory_used_mib: strip_unit(fields[2], "MiB").parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn parses_process_rows() {
        let output = "123, GPU-abc, 512 MiB\n4567, GPU-def, 30000 MiB\n";
        assert_eq!(
            parse_processes(output),
            vec![
                ProcessRecord {
                    pid: 123,
                    device_uuid: "GPU-abc".to_string(),
                    memory_used_mib: 512,
                },
                ProcessRecord {
                    pid: 4567,
                    device_uuid: "GPU-def".to_string(),
                    memory_used_mib: 30000,
                },
            ]
        );
    }

    #[test]
    fn skips_invalid_pids_and_memory() {
        let output = "\
0, GPU-abc, 512 MiB
-4, GPU-abc, 512 MiB
abc, GPU-abc, 512 MiB
77, GPU-abc, [N/A]
78, GPU-abc
79, GPU-abc, 64 MiB
";
        let pids: Vec<_> = parse_processes(output).into_iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![79]);
    }

    #[test]
    fn no_running_processes_is_empty_output() {
        assert!(parse_processes("").is_empty());
    }
}
