// # Docker Container Runtime
//
// This crate provides the Docker Engine implementation of the companion's
// `ContainerRuntime` trait.
//
// ## Architecture
//
// Thin adapter over `bollard`:
// - `list_containers` / `inspect_container`: running containers and their labels
// - `list_services` / `inspect_service`: swarm services with spec labels and
//   task-template container labels
// - `events`: `/events` subscription filtered to container and service
//   events, resumed from a `since` cursor
//
// The connection follows the usual `DOCKER_HOST` conventions
// (`Docker::connect_with_defaults`).

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::models::{EventMessage, EventMessageTypeEnum, Service};
use bollard::service::{InspectServiceOptions, ListServicesOptions};
use bollard::system::EventsOptions;
use companion_core::traits::{
    ContainerInfo, ContainerRuntime, EventKind, EventStream, RuntimeEvent, ServiceInfo,
};
use companion_core::{Error, Result};
use std::collections::HashMap;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Docker Engine container runtime
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the platform default socket
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_defaults()
            .map_err(|e| Error::config(format!("Failed to connect to Docker: {}", e)))?;
        Ok(Self { docker })
    }

    /// Wrap an existing client
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }
}

fn runtime_error(action: &str, e: bollard::errors::Error) -> Error {
    Error::runtime(format!("{}: {}", action, e))
}

/// Flatten a swarm service into its id and both label sets
fn service_info(service: Service) -> ServiceInfo {
    let spec = service.spec.unwrap_or_default();
    let container_labels = spec
        .task_template
        .and_then(|task| task.container_spec)
        .map(|container| container.labels.unwrap_or_default());

    ServiceInfo {
        id: service.id.unwrap_or_default(),
        labels: spec.labels.unwrap_or_default(),
        container_labels,
    }
}

/// Translate an engine event; events without a timestamp are dropped
fn runtime_event(message: EventMessage) -> Option<RuntimeEvent> {
    let time = message.time?;
    let kind = match message.typ {
        Some(EventMessageTypeEnum::CONTAINER) => EventKind::Container,
        Some(EventMessageTypeEnum::SERVICE) => EventKind::Service,
        Some(other) => EventKind::Other(other.to_string()),
        None => EventKind::Other(String::new()),
    };
    let actor_id = message
        .actor
        .and_then(|actor| actor.id)
        .filter(|id| !id.is_empty());

    Some(RuntimeEvent::new(
        kind,
        message.action.unwrap_or_default(),
        actor_id,
        time,
    ))
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<String>> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(|e| runtime_error("list containers", e))?;

        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInfo> {
        let container = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| runtime_error("inspect container", e))?;

        Ok(ContainerInfo {
            id: container.id.unwrap_or_else(|| id.to_string()),
            labels: container
                .config
                .and_then(|config| config.labels)
                .unwrap_or_default(),
        })
    }

    async fn list_services(&self) -> Result<Vec<ServiceInfo>> {
        let services = self
            .docker
            .list_services(None::<ListServicesOptions<String>>)
            .await
            .map_err(|e| runtime_error("list services", e))?;

        Ok(services.into_iter().map(service_info).collect())
    }

    async fn inspect_service(&self, id: &str) -> Result<ServiceInfo> {
        let service = self
            .docker
            .inspect_service(id, None::<InspectServiceOptions>)
            .await
            .map_err(|e| runtime_error("inspect service", e))?;

        let mut info = service_info(service);
        if info.id.is_empty() {
            info.id = id.to_string();
        }
        Ok(info)
    }

    fn events(&self, since: i64) -> EventStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let mut filters = HashMap::new();
            filters.insert(
                "type".to_string(),
                vec!["container".to_string(), "service".to_string()],
            );

            let options = EventsOptions::<String> {
                since: Some(since.to_string()),
                until: None,
                filters,
            };

            let mut events = Box::pin(docker.events(Some(options)));
            tracing::debug!("Subscribed to Docker events since {}", since);

            loop {
                tokio::select! {
                    item = events.next() => match item {
                        Some(Ok(message)) => {
                            if let Some(event) = runtime_event(message) {
                                if tx.send(Ok(event)).is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            let _ = tx.send(Err(runtime_error("event stream", e)));
                            break;
                        }
                        None => break,
                    },

                    _ = tx.closed() => break,
                }
            }
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{EventActor, ServiceSpec, TaskSpec, TaskSpecContainerSpec};

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn container_start_event() {
        let message = EventMessage {
            typ: Some(EventMessageTypeEnum::CONTAINER),
            action: Some("start".to_string()),
            actor: Some(EventActor {
                id: Some("abc".to_string()),
                attributes: None,
            }),
            time: Some(1_700_000_000),
            ..Default::default()
        };

        let event = runtime_event(message).unwrap();
        assert_eq!(event.kind, EventKind::Container);
        assert_eq!(event.action, "start");
        assert_eq!(event.actor_id.as_deref(), Some("abc"));
        assert_eq!(event.time, 1_700_000_000);
    }

    #[test]
    fn event_without_actor_id() {
        let message = EventMessage {
            typ: Some(EventMessageTypeEnum::SERVICE),
            action: Some("update".to_string()),
            actor: Some(EventActor {
                id: Some(String::new()),
                attributes: None,
            }),
            time: Some(1),
            ..Default::default()
        };

        let event = runtime_event(message).unwrap();
        assert_eq!(event.kind, EventKind::Service);
        assert_eq!(event.actor_id, None);
    }

    #[test]
    fn event_without_time_is_dropped() {
        assert!(runtime_event(EventMessage::default()).is_none());
    }

    #[test]
    fn service_label_sets() {
        let service = Service {
            id: Some("svc".to_string()),
            spec: Some(ServiceSpec {
                labels: Some(labels(&[("traefik.http.routers.a.rule", "Host(`a.example.com`)")])),
                task_template: Some(TaskSpec {
                    container_spec: Some(TaskSpecContainerSpec {
                        labels: Some(labels(&[("traefik.frontend.rule", "Host:b.example.com")])),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let info = service_info(service);
        assert_eq!(info.id, "svc");
        assert_eq!(info.labels.len(), 1);
        assert_eq!(
            info.container_labels
                .unwrap()
                .get("traefik.frontend.rule")
                .map(String::as_str),
            Some("Host:b.example.com")
        );
    }

    #[test]
    fn service_without_task_template() {
        let info = service_info(Service {
            id: Some("svc".to_string()),
            ..Default::default()
        });
        assert!(info.labels.is_empty());
        assert!(info.container_labels.is_none());
    }
}
