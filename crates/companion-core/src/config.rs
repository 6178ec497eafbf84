//! Configuration types for the companion
//!
//! These are resolved, validated values. Loading them from the process
//! environment and secret files is the daemon's job.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::parser::RuleSyntax;

/// Main companion configuration
#[derive(Debug, Clone)]
pub struct CompanionConfig {
    /// Domains whose zones receive records
    pub domains: Vec<DomainConfig>,

    /// Options for the synchronization engine
    pub sync: SyncOptions,

    /// Container label discovery (snapshot scan and event watcher)
    pub docker: DockerDiscoveryConfig,

    /// Reverse-proxy router polling
    pub router_poll: RouterPollConfig,
}

impl CompanionConfig {
    /// Create a configuration with default options for the given domains
    pub fn new(domains: Vec<DomainConfig>) -> Self {
        Self {
            domains,
            sync: SyncOptions::default(),
            docker: DockerDiscoveryConfig::default(),
            router_poll: RouterPollConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(Error::config("No domains configured"));
        }

        for domain in &self.domains {
            domain.validate()?;
        }

        if self.sync.record_type.trim().is_empty() {
            return Err(Error::config("Record type cannot be empty"));
        }

        if self.docker.swarm_mode && !self.docker.enabled {
            return Err(Error::config(
                "Swarm mode requires container discovery to be enabled",
            ));
        }

        if self.router_poll.enabled && self.router_poll.interval.is_zero() {
            return Err(Error::config("Router poll interval must be > 0"));
        }

        Ok(())
    }
}

/// A DNS domain managed by the companion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain name matched (as a substring) against discovered hostnames
    pub name: String,

    /// Provider zone identifier
    pub zone_id: String,

    /// Record content, e.g. the load balancer hostname for CNAME records
    pub target: String,

    /// Record TTL (1 = provider "automatic")
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Whether the provider should proxy traffic for the record
    #[serde(default)]
    pub proxied: bool,

    /// Optional record comment
    #[serde(default)]
    pub comment: Option<String>,

    /// Sub-domain labels never managed under this domain
    #[serde(default)]
    pub excluded_sub_domains: Vec<String>,
}

impl DomainConfig {
    /// Create a domain configuration with default TTL and no extras
    pub fn new(
        name: impl Into<String>,
        zone_id: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            zone_id: zone_id.into(),
            target: target.into(),
            ttl: default_ttl(),
            proxied: false,
            comment: None,
            excluded_sub_domains: Vec::new(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the proxied flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// Set the record comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set the excluded sub-domain labels
    pub fn with_excluded_sub_domains<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_sub_domains = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `host` falls under one of the excluded sub-domains
    pub fn is_excluded(&self, host: &str) -> bool {
        self.excluded_sub_domains
            .iter()
            .any(|sub| host.contains(&format!("{}.{}", sub, self.name)))
    }

    /// Whether `host` should be pointed at this domain's target
    pub fn matches(&self, host: &str) -> bool {
        host != self.target && host.contains(&self.name)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config("Domain name cannot be empty"));
        }
        if self.zone_id.is_empty() {
            return Err(Error::config(format!(
                "Zone ID is required for domain {}",
                self.name
            )));
        }
        if self.target.is_empty() {
            return Err(Error::config(format!(
                "Target is required for domain {}",
                self.name
            )));
        }
        Ok(())
    }
}

fn default_ttl() -> u32 {
    1
}

/// Synchronization engine options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Record type created/updated (e.g. "CNAME")
    pub record_type: String,

    /// Log intended mutations instead of executing them
    pub dry_run: bool,

    /// Update records even when their content already matches
    pub refresh_entries: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            record_type: "CNAME".to_string(),
            dry_run: false,
            refresh_entries: false,
        }
    }
}

/// Label filter: an entity passes when one of its labels has a key matching
/// `key` and a value matching `value`.
#[derive(Debug, Clone)]
pub struct LabelFilter {
    pub key: Regex,
    pub value: Regex,
}

impl LabelFilter {
    /// Compile a filter from raw patterns
    pub fn new(key: &str, value: &str) -> Result<Self> {
        Ok(Self {
            key: Regex::new(key)?,
            value: Regex::new(value)?,
        })
    }
}

/// Container/service label discovery settings
#[derive(Debug, Clone)]
pub struct DockerDiscoveryConfig {
    /// Enumerate containers and watch container events
    pub enabled: bool,

    /// Also enumerate services and watch service events
    pub swarm_mode: bool,

    /// Rule dialect of routing labels
    pub rule_syntax: RuleSyntax,

    /// Optional label filter
    pub filter: Option<LabelFilter>,

    /// Delay before reconnecting a failed event stream
    pub reconnect_delay: Duration,
}

impl Default for DockerDiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            swarm_mode: false,
            rule_syntax: RuleSyntax::default(),
            filter: None,
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

/// Include/exclude hostname patterns for router polling
#[derive(Debug, Clone, Default)]
pub struct HostFilter {
    /// At least one must match. Empty means match-all.
    pub include: Vec<Regex>,
    /// None may match.
    pub exclude: Vec<Regex>,
}

impl HostFilter {
    /// Compile a filter from raw patterns
    pub fn new<I, E>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let include = include
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let exclude = exclude
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { include, exclude })
    }

    /// Whether a hostname survives the filter
    pub fn allows(&self, host: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|re| re.is_match(host));
        included && !self.exclude.iter().any(|re| re.is_match(host))
    }
}

/// Reverse-proxy router polling settings
#[derive(Debug, Clone)]
pub struct RouterPollConfig {
    /// Whether polling is enabled
    pub enabled: bool,

    /// Poll interval
    pub interval: Duration,

    /// Hostname include/exclude patterns
    pub hosts: HostFilter,
}

impl Default for RouterPollConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(60),
            hosts: HostFilter::default(),
        }
    }
}
