//! Best-effort attribution of GPU processes to containers and pods.
//!
//! Processes come and go between the inventory query and the `/proc` reads,
//! so every failure here degrades to a partial or empty [`PodIdentity`].

mod cgroup;
mod environ;
mod procfs;

use std::sync::Arc;

use tracing::debug;

pub use cgroup::container_id;
pub use environ::Environment;
pub use procfs::ProcFs;
pub use procfs::ProcessIntrospector;
pub use procfs::DEFAULT_PROC_ROOT;

/// Workload identity recovered for one process. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PodIdentity {
    pub container_id: Option<String>,
    pub pod_name: Option<String>,
    pub namespace: Option<String>,
    pub stack_id: Option<String>,
}

impl PodIdentity {
    /// `true` when nothing could be recovered; such processes get no pod series.
    pub fn is_empty(&self) -> bool {
        self.container_id.is_none()
            && self.pod_name.is_none()
            && self.namespace.is_none()
            && self.stack_id.is_none()
    }

    /// Identity fields derived from an environment block.
    pub fn from_environment(env: &Environment) -> Self {
        let pod_name = env.pod_name();
        let stack_id = env.stack_id(pod_name.as_deref());
        Self {
            container_id: None,
            namespace: env.namespace(),
            pod_name,
            stack_id,
        }
    }
}

/// Resolves pids to [`PodIdentity`] through a [`ProcessIntrospector`].
#[derive(Clone)]
pub struct IdentityResolver {
    introspector: Arc<dyn ProcessIntrospector>,
}

impl IdentityResolver {
    pub fn new(introspector: Arc<dyn ProcessIntrospector>) -> Self {
        Self { introspector }
    }

    /// Never fails; unreadable sources leave the corresponding fields empty.
    #[tracing::instrument(level = "trace", skip(self))]
    pub async fn resolve(&self, pid: u32) -> PodIdentity {
        let (cgroup, environ) =
            tokio::join!(self.introspector.cgroup(pid), self.introspector.environ(pid));

        let container_id = match cgroup {
            Ok(text) => container_id(&text),
            Err(e) => {
                debug!(pid, error = %e, "Cannot read cgroup membership");
                None
            }
        };

        let environment = match environ {
            Ok(block) => Environment::parse(&block),
            Err(e) => {
                debug!(pid, error = %e, "Cannot read process environment");
                Environment::default()
            }
        };

        PodIdentity {
            container_id,
            ..PodIdentity::from_environment(&environment)
        }
    }
}
