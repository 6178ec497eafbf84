//! Core traits for the companion
//!
//! This module defines the abstract interfaces to external collaborators.
//!
//! - [`DnsProvider`]: Create/update DNS records via provider APIs
//! - [`ContainerRuntime`]: Inspect containers/services and stream their events
//! - [`RouterSource`]: Fetch the reverse proxy's routing table

pub mod container_runtime;
pub mod dns_provider;
pub mod router_source;

pub use container_runtime::{
    ContainerInfo, ContainerRuntime, EventKind, EventStream, Labels, RuntimeEvent, ServiceInfo,
};
pub use dns_provider::{DesiredRecord, DnsProvider, RemoteRecord};
pub use router_source::{Router, RouterFetch, RouterSource};
