// # Container Runtime Trait
//
// Defines the container/service inspection and event-subscription capability
// used by the snapshot scan and the event watcher.
//
// ## Implementations
//
// - Docker Engine: `companion-docker` crate

use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use tokio_stream::Stream;

/// Labels of a container or service
pub type Labels = HashMap<String, String>;

/// An inspected container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub labels: Labels,
}

/// An inspected clustered service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInfo {
    pub id: String,
    /// Labels on the service spec
    pub labels: Labels,
    /// Labels on the task template's container spec, if it has one
    pub container_labels: Option<Labels>,
}

/// Category of a lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Container,
    Service,
    Other(String),
}

/// A container/service lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub kind: EventKind,
    /// Action name, e.g. "start" or "update"
    pub action: String,
    /// Id of the container/service the event concerns
    pub actor_id: Option<String>,
    /// Unix timestamp (seconds)
    pub time: i64,
}

impl RuntimeEvent {
    pub fn new(
        kind: EventKind,
        action: impl Into<String>,
        actor_id: Option<String>,
        time: i64,
    ) -> Self {
        Self {
            kind,
            action: action.into(),
            actor_id,
            time,
        }
    }
}

/// Stream of runtime events; an `Err` item means the subscription broke
pub type EventStream =
    Pin<Box<dyn Stream<Item = Result<RuntimeEvent, crate::Error>> + Send + 'static>>;

/// Trait for container runtime implementations
///
/// Implementations must be thread-safe and every call individually
/// time-bounded. Listing and inspection errors are returned, never retried.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Ids of all currently running containers
    async fn list_containers(&self) -> Result<Vec<String>, crate::Error>;

    /// Inspect a single container
    async fn inspect_container(&self, id: &str) -> Result<ContainerInfo, crate::Error>;

    /// All clustered services
    async fn list_services(&self) -> Result<Vec<ServiceInfo>, crate::Error>;

    /// Inspect a single service
    async fn inspect_service(&self, id: &str) -> Result<ServiceInfo, crate::Error>;

    /// Subscribe to container and service events since `since` (Unix seconds)
    ///
    /// The subscription must be filtered to container and service events.
    fn events(&self, since: i64) -> EventStream;
}
