//! One-shot snapshot of every current discovery source
//!
//! Runs once before any background loop starts. Enumeration failures abort
//! the scan; a single entity failing inspection is logged and skipped.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::discovery::{LabelDiscovery, RouterPoller};
use crate::error::Result;
use crate::mapping::HostMapping;
use crate::traits::ContainerRuntime;

/// Startup enumeration of containers, services and the proxy router table
pub struct SnapshotScan {
    runtime: Option<Arc<dyn ContainerRuntime>>,
    labels: LabelDiscovery,
    swarm_mode: bool,
    poller: Option<RouterPoller>,
}

impl SnapshotScan {
    /// Create a scan.
    ///
    /// `runtime` is `None` when container discovery is disabled, `poller` is
    /// `None` when router polling is disabled.
    pub fn new(
        runtime: Option<Arc<dyn ContainerRuntime>>,
        labels: LabelDiscovery,
        swarm_mode: bool,
        poller: Option<RouterPoller>,
    ) -> Self {
        Self {
            runtime,
            labels,
            swarm_mode,
            poller,
        }
    }

    /// Enumerate all sources and merge the results
    pub async fn run(&self) -> Result<HostMapping> {
        let mut mapping = HostMapping::new();

        if let Some(runtime) = &self.runtime {
            mapping.merge(self.scan_containers(runtime.as_ref()).await?);

            if self.swarm_mode {
                mapping.merge(self.scan_services(runtime.as_ref()).await?);
            }
        }

        if let Some(poller) = &self.poller {
            mapping.merge(poller.check().await);
        }

        info!("Initial scan found {} hostname(s)", mapping.len());
        Ok(mapping)
    }

    async fn scan_containers(&self, runtime: &dyn ContainerRuntime) -> Result<HostMapping> {
        let ids = runtime.list_containers().await?;
        debug!("Scanning {} running container(s)", ids.len());

        let mut mapping = HostMapping::new();
        for id in ids {
            match runtime.inspect_container(&id).await {
                Ok(container) => {
                    let found =
                        self.labels.discover("Container", &container.id, &container.labels);
                    mapping.merge(found);
                }
                Err(e) => {
                    warn!("Skipping container {}: inspection failed: {}", id, e);
                }
            }
        }

        Ok(mapping)
    }

    async fn scan_services(&self, runtime: &dyn ContainerRuntime) -> Result<HostMapping> {
        let services = runtime.list_services().await?;
        debug!("Scanning {} service(s)", services.len());

        let mut mapping = HostMapping::new();
        for service in &services {
            mapping.merge(self.labels.discover_service(service));
        }

        Ok(mapping)
    }
}
