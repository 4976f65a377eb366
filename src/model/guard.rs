use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Single-concurrent-operation guard, keyed by operation identity.
///
/// Each UI affordance gets at most one in-flight request: `try_begin`
/// returns a permit only if no permit for the same key is alive, and the
/// permit releases the key when dropped. Replaces per-action in-progress
/// booleans with one reusable abstraction.
#[derive(Clone, Default)]
pub struct InflightGuard {
    inner: Arc<Mutex<HashSet<String>>>,
}

/// RAII permit for one in-flight operation.
pub struct InflightPermit {
    key: String,
    inner: Arc<Mutex<HashSet<String>>>,
}

impl InflightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the key. Returns `None` if an operation with the same key is
    /// already in flight (the caller should treat its request as a no-op).
    pub fn try_begin(&self, key: &str) -> Option<InflightPermit> {
        let mut inflight = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if !inflight.insert(key.to_string()) {
            debug!("Operation '{}' already in flight, suppressing duplicate", key);
            return None;
        }

        Some(InflightPermit {
            key: key.to_string(),
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn is_inflight(&self, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

impl Drop for InflightPermit {
    fn drop(&mut self) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}
