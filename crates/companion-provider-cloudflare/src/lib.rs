// # Cloudflare DNS Provider
//
// Cloudflare API v4 implementation of the companion's `DnsProvider` trait.
//
// ## Behaviour
//
// - One HTTP request per trait call
// - Errors are returned to the `SyncEngine`, which decides about retrying
// - HTTP timeout of 20 seconds per request
// - No caching, no background tasks, no dry-run (dry-run is owned by the engine)
//
// ## Authentication
//
// - API token: `Authorization: Bearer <token>`
// - Global API key: `X-Auth-Email` + `X-Auth-Key`, selected when an email is given
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs or `Debug` output
// - Provider construction fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use companion_core::traits::{DesiredRecord, DnsProvider, RemoteRecord};
use companion_core::{Error, Result};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);

const PROVIDER: &str = "cloudflare";

/// How requests authenticate
#[derive(Clone)]
enum Credentials {
    /// Scoped API token
    Token(String),
    /// Account email plus global API key
    GlobalKey { email: String, key: String },
}

/// Response envelope shared by every Cloudflare v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

fn format_errors(errors: &[ApiMessage]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Cloudflare DNS provider
///
/// Stateless and single-shot. Deciding whether to create, update or skip a
/// record is owned by `SyncEngine`.
pub struct CloudflareProvider {
    /// ⚠️ NEVER log this value
    credentials: Credentials,

    /// API base, overridable for tests
    base_url: Url,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match &self.credentials {
            Credentials::Token(_) => "token",
            Credentials::GlobalKey { .. } => "global-key",
        };
        f.debug_struct("CloudflareProvider")
            .field("auth", &auth)
            .field("credentials", &"<REDACTED>")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `token`: API token, or the global API key when `email` is set
    /// - `email`: Account email; selects global-key authentication when non-empty
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token is empty or the HTTP client
    /// cannot be built.
    pub fn new(token: impl Into<String>, email: Option<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(Error::config("Cloudflare API token is required"));
        }

        let credentials = match email.map(|e| e.trim().to_string()) {
            Some(email) if !email.is_empty() => Credentials::GlobalKey { email, key: token },
            _ => Credentials::Token(token),
        };

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(CLOUDFLARE_API_BASE)
            .map_err(|e| Error::config(format!("Invalid Cloudflare API base: {}", e)))?;

        Ok(Self {
            credentials,
            base_url,
            client,
        })
    }

    /// Point the provider at a different API base (e.g. a mock server)
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| Error::config(format!("Invalid API base URL {}: {}", base_url, e)))?;
        Ok(self)
    }

    /// Build `<base>/zones/<zone_id>/dns_records[/<record_id>]`
    fn records_url(&self, zone_id: &str, record_id: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::config("Cloudflare API base cannot carry a path"))?;
            segments.pop_if_empty().extend(["zones", zone_id, "dns_records"]);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// Send one request and unwrap the response envelope
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&DesiredRecord>,
        action: &str,
    ) -> Result<T> {
        tracing::trace!("Querying Cloudflare API: {} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header("Content-Type", "application/json");

        request = match &self.credentials {
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::GlobalKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        };

        if let Some(record) = body {
            request = request.json(record);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("Cloudflare {} request failed: {}", action, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read Cloudflare response: {}", e)))?;

        if status.as_u16() >= 400 {
            return Err(status_error(status, action, &text));
        }

        tracing::trace!("Cloudflare API response: {} {} -> {}", method, url, status);

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            Error::decode(format!("Failed to parse Cloudflare {} response: {}", action, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!("cloudflare {} failed: {}", action, format_errors(&envelope.errors)),
            ));
        }

        envelope.result.ok_or_else(|| {
            Error::decode(format!("Cloudflare {} response has no result", action))
        })
    }
}

/// Map an HTTP error status to a provider error
fn status_error(status: StatusCode, action: &str, body: &str) -> Error {
    let detail = match serde_json::from_str::<Envelope<serde_json::Value>>(body) {
        Ok(envelope) if !envelope.errors.is_empty() => format_errors(&envelope.errors),
        _ => body.to_string(),
    };

    let message = match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: invalid credentials or insufficient permissions. Status: {}: {}",
            status, detail
        ),
        429 => format!("Rate limit exceeded. Status: {}: {}", status, detail),
        500..=599 => format!("Cloudflare server error (transient): {}: {}", status, detail),
        _ => format!("cloudflare {} failed: http status {}: {}", action, status.as_u16(), detail),
    };

    Error::provider(PROVIDER, message)
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn list_records(&self, zone_id: &str, name: &str) -> Result<Vec<RemoteRecord>> {
        let mut url = self.records_url(zone_id, None)?;
        url.query_pairs_mut().append_pair("name", name);

        self.request(Method::GET, url, None, "list").await
    }

    async fn create_record(&self, zone_id: &str, record: &DesiredRecord) -> Result<RemoteRecord> {
        let url = self.records_url(zone_id, None)?;
        self.request(Method::POST, url, Some(record), "create").await
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<RemoteRecord> {
        let url = self.records_url(zone_id, Some(record_id))?;
        self.request(Method::PUT, url, Some(record), "update").await
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
