use core::error::Error;
use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

use derive_more::Display;

#[derive(Debug, Display)]
pub enum PersistError {
    #[display("failed to write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
    #[display("failed to move {} into place: {message}", path.display())]
    Rename { path: PathBuf, message: String },
}

impl Error for PersistError {}

/// Sibling path used while writing, `<path>.new`.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".new");
    PathBuf::from(name)
}

/// Replaces `path` with `content` so that readers see either the old or the
/// new file in full.
///
/// # Errors
///
/// - [`PersistError::Write`] if the staging file cannot be written
/// - [`PersistError::Rename`] if it cannot be renamed over `path`
pub async fn write_atomic(path: &Path, content: &str) -> Result<(), PersistError> {
    let staging = staging_path(path);

    if let Err(e) = tokio::fs::write(&staging, content).await {
        discard(&staging).await;
        return Err(PersistError::Write {
            path: staging,
            message: e.to_string(),
        });
    }

    if let Err(e) = tokio::fs::rename(&staging, path).await {
        discard(&staging).await;
        return Err(PersistError::Rename {
            path: path.to_path_buf(),
            message: e.to_string(),
        });
    }

    Ok(())
}

async fn discard(staging: &Path) {
    if let Err(e) = tokio::fs::remove_file(staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!(path = %staging.display(), error = %e, "Cannot remove staging file");
        }
    }
}
