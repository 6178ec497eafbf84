//! Synchronization engine
//!
//! The SyncEngine is responsible for:
//! - Checking SyncedState so each hostname is reconciled once per priority
//! - Selecting the configured domains a hostname belongs to
//! - Creating or updating provider records (or logging them under dry-run)
//! - Recording successful reconciliation
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │ SnapshotScan │  │ EventWatcher │  │ RouterPoller │
//! └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!        │   HostMapping   │                 │
//!        └────────────────┬┴─────────────────┘
//!                         ▼
//!                  ┌──────────────┐
//!                  │  SyncEngine  │
//!                  └──────┬───────┘
//!            ┌────────────┴────────────┐
//!            ▼                         ▼
//!     ┌─────────────┐           ┌──────────────┐
//!     │ SyncedState │           │ DnsProvider  │
//!     │ (check/mark)│           │ (list/create │
//!     └─────────────┘           │  /update)    │
//!                               └──────────────┘
//! ```
//!
//! ## Flow per hostname
//!
//! 1. Skip if already synced at an equal or more authoritative priority
//! 2. Find matching domains (substring match, self-reference guard, exclusions)
//! 3. Per domain: list records; create if none, else update records whose
//!    content differs (or all of them when refreshing entries)
//! 4. If nothing failed, record the hostname at the incoming priority

use std::sync::Arc;
use tracing::{debug, error, info, trace};

use crate::config::{DomainConfig, SyncOptions};
use crate::mapping::{HostMapping, Priority};
use crate::state::SyncedState;
use crate::traits::{DesiredRecord, DnsProvider, RemoteRecord};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Hostnames reconciled and recorded in SyncedState
    pub synced: Vec<String>,
    /// Hostnames skipped because an equal or stronger source already synced them
    pub skipped: Vec<String>,
    /// Hostnames with at least one failed provider call; retried next pass
    pub failed: Vec<String>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Idempotent, dry-run-aware reconciliation against the DNS provider
///
/// ## Threading
///
/// The engine is shared behind an `Arc` by the event watcher and the router
/// poller. SyncedState is only locked around a single entry's check or
/// write, so different hostnames reconcile concurrently.
pub struct SyncEngine {
    /// DNS provider for record calls
    provider: Arc<dyn DnsProvider>,

    /// Configured domains, never mutated after construction
    domains: Vec<DomainConfig>,

    /// Record type, dry-run and refresh flags
    options: SyncOptions,

    /// Hostnames already reconciled
    state: SyncedState,
}

impl SyncEngine {
    /// Create a new engine
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        domains: Vec<DomainConfig>,
        options: SyncOptions,
        state: SyncedState,
    ) -> Self {
        Self {
            provider,
            domains,
            options,
            state,
        }
    }

    /// Handle onto the engine's synced state
    pub fn state(&self) -> &SyncedState {
        &self.state
    }

    /// Reconcile every hostname of a merged mapping
    pub async fn sync_mappings(&self, mappings: &HostMapping) -> SyncReport {
        let mut report = SyncReport::default();

        for (host, priority) in mappings.iter() {
            if !self.state.needs_sync(host, priority).await {
                trace!("{} already synced at priority <= {}, skipping", host, priority);
                report.skipped.push(host.to_string());
                continue;
            }

            if self.point_domain(host).await {
                self.state.mark_synced(host, priority).await;
                report.synced.push(host.to_string());
            } else {
                report.failed.push(host.to_string());
            }
        }

        if !report.failed.is_empty() {
            debug!(
                "Sync pass finished with {} failed hostname(s): {:?}",
                report.failed.len(),
                report.failed
            );
        }

        report
    }

    /// Point a hostname at the target of every matching domain.
    ///
    /// Returns `false` if any provider call failed for this hostname.
    pub async fn point_domain(&self, host: &str) -> bool {
        let mut ok = true;

        for domain in &self.domains {
            if !domain.matches(host) {
                continue;
            }
            if domain.is_excluded(host) {
                trace!("Ignoring {} because it falls under excluded sub domain", host);
                continue;
            }

            if !self.apply_domain(host, domain).await {
                ok = false;
            }
        }

        ok
    }

    /// Reconcile one hostname inside one domain's zone
    async fn apply_domain(&self, host: &str, domain: &DomainConfig) -> bool {
        let records = match self.provider.list_records(&domain.zone_id, host).await {
            Ok(records) => records,
            Err(e) => {
                error!("{} list dns records failed: {}", host, e);
                return false;
            }
        };

        let desired = self.desired_record(host, domain);

        if records.is_empty() {
            trace!(
                "Domain {}: record exists=false, configuration change required=true",
                host
            );
            return self.create(host, domain, &desired).await;
        }

        trace!(
            "Domain {}: record exists=true, configuration change required={}",
            host,
            self.requires_change(&records, domain)
        );

        let mut ok = true;
        for record in &records {
            if record.content != domain.target || self.options.refresh_entries {
                if !self.update(host, domain, record, &desired).await {
                    ok = false;
                }
            } else {
                trace!("Existing record: {} already points to {}", host, domain.target);
            }
        }
        ok
    }

    async fn create(&self, host: &str, domain: &DomainConfig, desired: &DesiredRecord) -> bool {
        if self.options.dry_run {
            info!(
                "DRY-RUN: POST to {} zone {}: {:?}",
                self.provider.provider_name(),
                domain.zone_id,
                desired
            );
            return true;
        }

        match self.provider.create_record(&domain.zone_id, desired).await {
            Ok(_) => {
                info!("Created new record: {} to point to {}", host, domain.target);
                true
            }
            Err(e) => {
                error!("{} create record failed: {}", host, e);
                false
            }
        }
    }

    async fn update(
        &self,
        host: &str,
        domain: &DomainConfig,
        record: &RemoteRecord,
        desired: &DesiredRecord,
    ) -> bool {
        if self.options.dry_run {
            info!(
                "DRY-RUN: PUT to {} zone {}, record {}: {:?}",
                self.provider.provider_name(),
                domain.zone_id,
                record.id,
                desired
            );
            return true;
        }

        match self
            .provider
            .update_record(&domain.zone_id, &record.id, desired)
            .await
        {
            Ok(_) => {
                info!("Updated existing record: {} to point to {}", host, domain.target);
                true
            }
            Err(e) => {
                error!("{} update record failed: {}", host, e);
                false
            }
        }
    }

    fn requires_change(&self, records: &[RemoteRecord], domain: &DomainConfig) -> bool {
        self.options.refresh_entries || records.iter().any(|r| r.content != domain.target)
    }

    fn desired_record(&self, host: &str, domain: &DomainConfig) -> DesiredRecord {
        DesiredRecord {
            record_type: self.options.record_type.clone(),
            name: host.to_string(),
            content: domain.target.clone(),
            ttl: domain.ttl,
            proxied: domain.proxied,
            comment: domain.comment.clone().filter(|c| !c.is_empty()),
        }
    }

    /// Reconcile a single hostname proposed at `priority`
    pub async fn sync_host(&self, host: &str, priority: Priority) -> SyncReport {
        let mut mapping = HostMapping::new();
        mapping.insert(host, priority);
        self.sync_mappings(&mapping).await
    }
}
