use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

/// Default mount point of the host proc filesystem.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Source of per-process OS metadata.
///
/// Either read may fail at any time because the process exited; callers treat
/// failures as missing data.
#[async_trait]
pub trait ProcessIntrospector: Send + Sync {
    /// Control-group membership text of `pid`.
    async fn cgroup(&self, pid: u32) -> io::Result<String>;

    /// Raw NUL-separated environment block of `pid`.
    async fn environ(&self, pid: u32) -> io::Result<Vec<u8>>;
}

/// [`ProcessIntrospector`] reading `<root>/<pid>/cgroup` and `<root>/<pid>/environ`.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry(&self, pid: u32, name: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(name)
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

#[async_trait]
impl ProcessIntrospector for ProcFs {
    async fn cgroup(&self, pid: u32) -> io::Result<String> {
        let bytes = fs::read(self.entry(pid, "cgroup")).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn environ(&self, pid: u32) -> io::Result<Vec<u8>> {
        fs::read(self.entry(pid, "environ")).await
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    #[test(tokio::test)]
    async fn reads_entries_below_custom_root() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("42")).unwrap();
        std::fs::write(root.path().join("42/cgroup"), "0::/init.scope\n").unwrap();
        std::fs::write(root.path().join("42/environ"), b"A=1\0B=2\0").unwrap();

        let procfs = ProcFs::new(root.path());

        assert_eq!(procfs.cgroup(42).await.unwrap(), "0::/init.scope\n");
        assert_eq!(procfs.environ(42).await.unwrap(), b"A=1\0B=2\0".to_vec());
    }

    #[test(tokio::test)]
    async fn exited_process_is_an_io_error() {
        let root = tempfile::tempdir().unwrap();
        let procfs = ProcFs::new(root.path());

        let err = procfs.cgroup(999_999).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(procfs.environ(999_999).await.is_err());
    }
}
