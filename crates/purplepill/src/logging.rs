use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

pub const DEFAULT_LOG_FILE: &str = "/var/log/cm-purplepill.log";
pub const FALLBACK_LOG_FILE: &str = "/tmp/cm-purplepill.log";

/// initiate the global tracing subscriber
///
/// Logs go to stderr and to `log_file`, or to [`FALLBACK_LOG_FILE`] when that
/// cannot be opened. With neither usable only stderr remains and `None` is
/// returned. Keep the guard alive until exit.
pub fn init(log_file: &Path) -> Option<WorkerGuard> {
    let mut unusable = Vec::new();
    let mut file_layer = None;
    for candidate in [log_file, Path::new(FALLBACK_LOG_FILE)] {
        match utils::logging::get_file_layer(candidate) {
            Ok(layer) => {
                file_layer = Some((candidate, layer));
                break;
            }
            Err(e) => unusable.push((candidate, e)),
        }
    }

    let (path, layer, guard) = match file_layer {
        Some((path, (layer, guard))) => (Some(path), Some(layer), Some(guard)),
        None => (None, None, None),
    };

    registry()
        .with(utils::logging::env_filter())
        .with(utils::logging::get_fmt_layer())
        .with(layer)
        .init();

    for (candidate, e) in unusable {
        tracing::warn!(path = %candidate.display(), error = %e, "Log file unusable");
    }
    if let Some(path) = path {
        tracing::debug!(path = %path.display(), "Logging to file");
    }

    guard
}
