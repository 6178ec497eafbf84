// # Router Source Trait
//
// Defines how the reverse proxy's current routing table is fetched.
//
// ## Implementations
//
// - Traefik API: `companion-traefik` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One HTTP router as reported by the reverse proxy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub status: String,
}

/// Outcome of a routing table fetch that reached the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterFetch {
    /// 200 with a well-formed body
    Routers(Vec<Router>),
    /// Non-200 status; a soft failure, not an error
    Status { status: u16, body: String },
}

/// Trait for router table sources
///
/// Transport failures and malformed 200 bodies are `Err`
/// (`Error::RouterSource` / `Error::Decode`); a non-200 status is reported as
/// [`RouterFetch::Status`].
#[async_trait]
pub trait RouterSource: Send + Sync {
    async fn fetch_routers(&self) -> Result<RouterFetch, crate::Error>;

    /// Human readable location, used in log lines
    fn endpoint(&self) -> String;
}
