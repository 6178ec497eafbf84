//! Discovery sources
//!
//! - [`SnapshotScan`]: one-shot enumeration at startup
//! - [`EventWatcher`]: reconnecting stream of container/service events
//! - [`RouterPoller`]: timer-driven fetch of the proxy's routing table
//!
//! Each source produces [`HostMapping`](crate::mapping::HostMapping)s that
//! are handed to the [`SyncEngine`](crate::engine::SyncEngine).

pub mod labels;
pub mod poller;
pub mod scan;
pub mod watcher;

pub use labels::LabelDiscovery;
pub use poller::RouterPoller;
pub use scan::SnapshotScan;
pub use watcher::{DiscoveryCursor, EventHandler, EventWatcher};

use tokio::sync::watch;

/// Resolves once shutdown is signalled or the signalling side is gone
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
