use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

/// Holds the latest exposition document.
///
/// The lock only guards the pointer swap; readers clone the [`Arc`] and
/// render without holding it. Starts out empty.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    slot: Arc<Mutex<Arc<str>>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Arc::from(""))),
        }
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<str> {
        let guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Publishes `document`, returning the one it replaced.
    pub fn replace(&self, document: impl Into<Arc<str>>) -> Arc<str> {
        let document = document.into();
        let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, document)
    }
}
