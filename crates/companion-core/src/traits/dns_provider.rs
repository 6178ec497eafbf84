// # DNS Provider Trait
//
// Defines the request/response contract to the remote DNS API.
//
// ## Implementations
//
// - Cloudflare: `companion-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use companion_core::DnsProvider;
//
// let records = provider.list_records("zone-id", "app.example.com").await?;
// if records.is_empty() {
//     provider.create_record("zone-id", &desired).await?;
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A record as it currently exists at the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Provider-side record identifier
    pub id: String,
    /// Current record content
    #[serde(default)]
    pub content: String,
}

/// Desired state of a record, serialized as the create/update request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredRecord {
    /// Record type (e.g. "CNAME")
    #[serde(rename = "type")]
    pub record_type: String,
    /// Fully qualified hostname
    pub name: String,
    /// Record content (the domain's target)
    pub content: String,
    /// Time-to-live
    pub ttl: u32,
    /// Whether the provider proxies traffic
    pub proxied: bool,
    /// Optional comment, omitted from the body when absent
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,
}

/// Trait for DNS provider implementations
///
/// Implementations are stateless, single-shot clients: one HTTP call per
/// method invocation, no retries, no caching. Deciding whether a create or
/// update is needed is owned by the `SyncEngine`.
///
/// Every call must be individually time-bounded.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List records with exactly this name inside the zone
    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
    ) -> Result<Vec<RemoteRecord>, crate::Error>;

    /// Create a record
    async fn create_record(
        &self,
        zone_id: &str,
        record: &DesiredRecord,
    ) -> Result<RemoteRecord, crate::Error>;

    /// Overwrite an existing record
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<RemoteRecord, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
