//! Top-level orchestration
//!
//! ## Lifecycle
//!
//! 1. Snapshot scan of every enabled source (fatal on enumeration failure)
//! 2. One reconciliation pass over the merged mapping
//! 3. Event watcher and router poller run concurrently against one shared
//!    [`SyncEngine`] until the shutdown signal flips to `true`
//! 4. Both loops are joined before `run` returns

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::CompanionConfig;
use crate::discovery::{
    DiscoveryCursor, EventHandler, EventWatcher, LabelDiscovery, RouterPoller, SnapshotScan,
};
use crate::engine::SyncEngine;
use crate::error::{Error, Result};
use crate::state::SyncedState;
use crate::traits::{ContainerRuntime, DnsProvider, RouterSource};

/// Wires discovery sources to the synchronization engine
pub struct Companion {
    engine: Arc<SyncEngine>,
    runtime: Option<Arc<dyn ContainerRuntime>>,
    labels: LabelDiscovery,
    swarm_mode: bool,
    reconnect_delay: Duration,
    poller: Option<RouterPoller>,
}

impl Companion {
    /// Build a companion from a validated configuration.
    ///
    /// `runtime` is required when container discovery is enabled and
    /// `routers` when router polling is enabled; either is ignored otherwise.
    pub fn new(
        config: CompanionConfig,
        provider: Arc<dyn DnsProvider>,
        runtime: Option<Arc<dyn ContainerRuntime>>,
        routers: Option<Arc<dyn RouterSource>>,
    ) -> Result<Self> {
        config.validate()?;

        let runtime = if config.docker.enabled {
            Some(runtime.ok_or_else(|| {
                Error::config("Container discovery is enabled but no container runtime was given")
            })?)
        } else {
            None
        };

        let poller = if config.router_poll.enabled {
            let source = routers.ok_or_else(|| {
                Error::config("Router polling is enabled but no router source was given")
            })?;
            Some(RouterPoller::new(
                source,
                config.router_poll.hosts.clone(),
                config.router_poll.interval,
            ))
        } else {
            None
        };

        let engine = SyncEngine::new(provider, config.domains, config.sync, SyncedState::new());

        Ok(Self {
            engine: Arc::new(engine),
            runtime,
            labels: LabelDiscovery::new(config.docker.rule_syntax, config.docker.filter),
            swarm_mode: config.docker.swarm_mode,
            reconnect_delay: config.docker.reconnect_delay,
            poller,
        })
    }

    /// The shared engine
    pub fn engine(&self) -> Arc<SyncEngine> {
        self.engine.clone()
    }

    /// Run until `shutdown` becomes `true`.
    ///
    /// Only a failed startup scan is returned as an error; everything after
    /// it is logged and retried.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if *shutdown.borrow() {
            info!("Shutdown already requested, not starting");
            return Ok(());
        }

        // Events raised while the scan and initial sync run are replayed.
        let cursor = DiscoveryCursor::now();

        let scan = SnapshotScan::new(
            self.runtime.clone(),
            self.labels.clone(),
            self.swarm_mode,
            self.poller.clone(),
        );

        let mapping = tokio::select! {
            result = scan.run() => {
                result.map_err(|e| Error::runtime(format!("Initial scan failed: {}", e)))?
            }
            _ = crate::discovery::shutdown_requested(&mut shutdown) => {
                info!("Shutdown requested during initial scan");
                return Ok(());
            }
        };

        let report = self.engine.sync_mappings(&mapping).await;
        info!(
            "Initial sync: {} synced, {} skipped, {} failed",
            report.synced.len(),
            report.skipped.len(),
            report.failed.len()
        );

        let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        if let Some(runtime) = self.runtime.clone() {
            let handler = EventHandler::new(runtime, self.labels.clone(), self.swarm_mode);
            let watcher = EventWatcher::new(handler, self.reconnect_delay).with_cursor(cursor);
            let engine = self.engine.clone();
            let rx = shutdown.clone();
            tasks.push((
                "event-watcher",
                tokio::spawn(async move {
                    watcher.run(engine, rx).await;
                }),
            ));
        }

        if let Some(poller) = self.poller.clone() {
            let engine = self.engine.clone();
            let rx = shutdown.clone();
            tasks.push(("router-poller", tokio::spawn(poller.run(engine, rx))));
        }

        if tasks.is_empty() {
            warn!("No background discovery source enabled; waiting for shutdown");
        }

        crate::discovery::shutdown_requested(&mut shutdown).await;
        info!("Shutdown requested, stopping discovery loops");

        for (name, task) in tasks {
            if let Err(e) = task.await {
                error!("{} terminated abnormally: {}", name, e);
            }
        }

        info!("Companion stopped");
        Ok(())
    }
}
