//! Start/stop bookkeeping shared by the collector and the server.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long `stop` waits for a background task before aborting it.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// A spawned task together with the token that asks it to finish.
#[derive(Debug)]
pub(crate) struct BackgroundTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub(crate) fn new(token: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self { token, handle }
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancels the task and waits up to `timeout` for it to return.
    pub(crate) async fn shutdown(self, name: &str, timeout: Duration) {
        self.token.cancel();
        let abort = self.handle.abort_handle();
        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(task = name, error = %e, "Task failed during shutdown"),
            Err(_) => {
                tracing::warn!(task = name, ?timeout, "Task shutdown timed out, aborting");
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test(tokio::test)]
    async fn shutdown_cancels_cooperative_task() {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move { child.cancelled().await });
        let task = BackgroundTask::new(token, handle);
        assert!(task.is_alive());

        task.shutdown("test", Duration::from_secs(1)).await;
    }

    #[test(tokio::test)]
    async fn shutdown_aborts_stuck_task() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _tx = tx;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let task = BackgroundTask::new(CancellationToken::new(), handle);

        task.shutdown("stuck", Duration::from_millis(50)).await;

        // The sender is dropped once the aborted task is torn down.
        assert!(rx.await.is_err());
    }
}
