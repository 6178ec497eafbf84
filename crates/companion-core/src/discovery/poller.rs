//! Periodic reverse-proxy router polling
//!
//! Each tick fetches the proxy's routing table and turns enabled routers with
//! a `Host` predicate into a [`HostMapping`] at [`Priority::ROUTER_POLL`].
//! Non-200 responses, transport errors and malformed bodies are soft
//! failures: logged, empty mapping, next tick proceeds normally.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, trace};

use crate::config::HostFilter;
use crate::engine::SyncEngine;
use crate::mapping::{HostMapping, Priority};
use crate::parser::parse_host_rule;
use crate::traits::{Router, RouterFetch, RouterSource};

/// Timer-driven re-fetch of the proxy's routing table
#[derive(Clone)]
pub struct RouterPoller {
    source: Arc<dyn RouterSource>,
    hosts: HostFilter,
    interval: Duration,
}

impl RouterPoller {
    pub fn new(source: Arc<dyn RouterSource>, hosts: HostFilter, interval: Duration) -> Self {
        Self {
            source,
            hosts,
            interval,
        }
    }

    /// Perform one poll
    pub async fn check(&self) -> HostMapping {
        trace!("Querying routers from {}", self.source.endpoint());

        match self.source.fetch_routers().await {
            Ok(RouterFetch::Routers(routers)) => self.extract(&routers),
            Ok(RouterFetch::Status { status, body }) => {
                error!("Router API returned error {}: {}", status, body);
                HostMapping::new()
            }
            Err(e) => {
                error!("Failed to poll routers: {}", e);
                HostMapping::new()
            }
        }
    }

    /// Hostnames of enabled, named routers that survive the host filter
    pub fn extract(&self, routers: &[Router]) -> HostMapping {
        let mut mapping = HostMapping::new();

        for router in routers {
            if router.status != "enabled" || router.name.is_empty() {
                continue;
            }
            if !router.rule.contains("Host") {
                continue;
            }
            for host in parse_host_rule(&router.rule) {
                if !self.hosts.allows(&host) {
                    continue;
                }
                trace!("Found Router Name: {} with Hostname {}", router.name, host);
                mapping.insert(host, Priority::ROUTER_POLL);
            }
        }

        mapping
    }

    /// Poll on every interval tick until shutdown.
    ///
    /// The first tick is skipped because the startup scan already polled once.
    /// Each tick runs in its own task so a panic is logged and the loop
    /// continues.
    pub async fn run(self, engine: Arc<SyncEngine>, mut shutdown: watch::Receiver<bool>) {
        info!("Starting router poller (every {:?})", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let poller = self.clone();
                    let engine = engine.clone();
                    let tick = tokio::spawn(async move {
                        let mapping = poller.check().await;
                        engine.sync_mappings(&mapping).await
                    });

                    if let Err(e) = tick.await {
                        error!("Recovered panic in router-poller: {}", e);
                    }
                }

                _ = super::shutdown_requested(&mut shutdown) => {
                    info!("Router poller stopped");
                    break;
                }
            }
        }
    }
}
