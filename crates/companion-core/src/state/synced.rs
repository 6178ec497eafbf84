// # In-memory synced state
//
// Maps hostname → priority at which it was last successfully synchronized.
//
// ## Rule
//
// A hostname is re-synchronized only when it was never synced, or when the
// incoming priority is strictly more authoritative (numerically lower) than
// the recorded one. A less authoritative source can therefore never make the
// engine reprocess a hostname already confirmed by a more authoritative one.
//
// ## Locking
//
// The lock guards a single entry's check or write and is never held across a
// provider call.
//
// ## Crash Behavior
//
// Nothing is persisted. After a restart every hostname is treated as new.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::mapping::Priority;

/// Shared record of successfully synchronized hostnames
///
/// Cloning is cheap and yields a handle onto the same state.
///
/// # Example
///
/// ```rust
/// use companion_core::mapping::Priority;
/// use companion_core::state::SyncedState;
///
/// #[tokio::main]
/// async fn main() {
///     let state = SyncedState::new();
///     assert!(state.needs_sync("a.example.com", Priority::ROUTER_POLL).await);
///
///     state.mark_synced("a.example.com", Priority::ROUTER_POLL).await;
///     assert!(!state.needs_sync("a.example.com", Priority::ROUTER_POLL).await);
///     assert!(state.needs_sync("a.example.com", Priority::DISCOVERY).await);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncedState {
    inner: Arc<Mutex<HashMap<String, Priority>>>,
}

impl SyncedState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a hostname proposed at `priority` must be reconciled
    pub async fn needs_sync(&self, host: &str, priority: Priority) -> bool {
        let guard = self.inner.lock().await;
        match guard.get(host) {
            Some(recorded) => priority < *recorded,
            None => true,
        }
    }

    /// Record a successful synchronization.
    ///
    /// If a concurrent pass already recorded a more authoritative priority for
    /// the same hostname, that entry is kept.
    pub async fn mark_synced(&self, host: &str, priority: Priority) {
        let mut guard = self.inner.lock().await;
        let entry = guard.entry(host.to_string()).or_insert(priority);
        if priority < *entry {
            *entry = priority;
        } else if priority > *entry {
            tracing::debug!(
                "Keeping priority {} for {} (pass at priority {} finished later)",
                entry,
                host,
                priority
            );
        }
    }

    /// Priority at which a hostname was last synced
    pub async fn get(&self, host: &str) -> Option<Priority> {
        self.inner.lock().await.get(host).copied()
    }

    /// Number of synced hostnames
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Check if nothing has been synced yet
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
