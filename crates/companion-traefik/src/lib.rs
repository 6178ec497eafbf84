// # Traefik Router Source
//
// This crate provides the Traefik API implementation of the companion's
// `RouterSource` trait.
//
// ## Purpose
//
// Hostnames served by Traefik are not always declared on container labels
// (file provider, other orchestrators, middleware-generated routers). Polling
// the router table catches them at the weaker `ROUTER_POLL` priority.
//
// ## Architecture
//
// One `GET {base}/api/http/routers` per call. The client neither polls nor
// retries; the core `RouterPoller` owns the schedule.
//
// - 200 with a JSON array → `RouterFetch::Routers`
// - any other status → `RouterFetch::Status` (soft failure)
// - transport error → `Error::RouterSource`
// - 200 with malformed JSON → `Error::Decode`

use async_trait::async_trait;
use companion_core::traits::{Router, RouterFetch, RouterSource};
use companion_core::{Error, Result};
use std::path::Path;
use std::time::Duration;

/// HTTP timeout for one router fetch
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Path of the HTTP routers endpoint below the API base
const ROUTERS_PATH: &str = "/api/http/routers";

/// Traefik API client
#[derive(Debug, Clone)]
pub struct TraefikClient {
    /// Full routers endpoint URL
    endpoint: String,

    client: reqwest::Client,
}

impl TraefikClient {
    /// Create a new Traefik client
    ///
    /// # Parameters
    ///
    /// - `base_url`: Traefik API base (e.g. "http://traefik:8080"); a trailing
    ///   `/` is ignored
    /// - `ca_cert_file`: Optional PEM bundle; every certificate in it is
    ///   added to the trusted roots
    /// - `insecure_skip_verify`: Accept any server certificate
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the CA file cannot be read or parsed,
    /// or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        ca_cert_file: Option<&Path>,
        insecure_skip_verify: bool,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .danger_accept_invalid_certs(insecure_skip_verify);

        if let Some(path) = ca_cert_file {
            let pem = std::fs::read(path).map_err(|e| {
                Error::config(format!("failed to read CA cert file {}: {}", path.display(), e))
            })?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                Error::config(format!("failed to parse CA certs from {}: {}", path.display(), e))
            })?;
            if certs.is_empty() {
                return Err(Error::config(format!(
                    "no CA certificates found in {}",
                    path.display()
                )));
            }
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), ROUTERS_PATH),
            client,
        })
    }
}

#[async_trait]
impl RouterSource for TraefikClient {
    async fn fetch_routers(&self) -> Result<RouterFetch> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| Error::router_source(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::router_source(format!("Failed to read response: {}", e)))?;

        if status != reqwest::StatusCode::OK {
            return Ok(RouterFetch::Status {
                status: status.as_u16(),
                body,
            });
        }

        let routers: Vec<Router> = serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("failed to decode JSON from Traefik: {}", e)))?;

        tracing::trace!("Traefik returned {} router(s)", routers.len());
        Ok(RouterFetch::Routers(routers))
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}
