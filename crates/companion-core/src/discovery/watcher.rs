//! Reconnecting container/service event watcher
//!
//! ## State machine
//!
//! ```text
//!            ┌────────────┐  subscribe   ┌───────────┐
//!     ┌─────▶│ Connecting │─────────────▶│ Streaming │◀──┐ event
//!     │      └────────────┘              └─────┬─────┘───┘
//!     │ delay                       error/close│
//!     │      ┌────────────┐                    │
//!     └──────│  Backoff   │◀───────────────────┘
//!            └────────────┘
//! ```
//!
//! Suspension points are the stream read and the backoff timer; both also
//! wait on the shutdown signal, which is the only way out of the loop.
//!
//! Every event advances the [`DiscoveryCursor`], so a reconnect resumes from
//! the last seen event. Events sharing the cursor's second may be replayed
//! after a reconnect; the synced-state check makes that harmless.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::discovery::LabelDiscovery;
use crate::engine::SyncEngine;
use crate::mapping::HostMapping;
use crate::traits::{ContainerRuntime, EventKind, EventStream, RuntimeEvent};

/// Resume token of the event stream: Unix seconds of the last processed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DiscoveryCursor(i64);

impl DiscoveryCursor {
    /// Cursor positioned at the current wall-clock second
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp())
    }

    pub fn at(timestamp: i64) -> Self {
        Self(timestamp)
    }

    pub fn timestamp(&self) -> i64 {
        self.0
    }

    /// Move forward to `timestamp`; never moves backwards
    pub fn advance(&mut self, timestamp: i64) {
        if timestamp > self.0 {
            self.0 = timestamp;
        }
    }
}

/// Turns one runtime event into a single-entity host mapping
#[derive(Clone)]
pub struct EventHandler {
    runtime: Arc<dyn ContainerRuntime>,
    labels: LabelDiscovery,
    swarm_mode: bool,
}

impl EventHandler {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        labels: LabelDiscovery,
        swarm_mode: bool,
    ) -> Self {
        Self {
            runtime,
            labels,
            swarm_mode,
        }
    }

    /// Re-inspect the entity an event concerns and discover its hostnames.
    ///
    /// Only container `start` and (in swarm mode) service `update` events
    /// are relevant; everything else yields an empty mapping.
    pub async fn process(&self, event: &RuntimeEvent) -> HostMapping {
        match (&event.kind, event.action.as_str()) {
            (EventKind::Container, "start") => {
                let Some(id) = event.actor_id.as_deref().filter(|id| !id.is_empty()) else {
                    debug!("Skip container event without id");
                    return HostMapping::new();
                };
                match self.runtime.inspect_container(id).await {
                    Ok(container) => {
                        self.labels
                            .discover("Container", &container.id, &container.labels)
                    }
                    Err(e) => {
                        warn!("Failed to inspect started container {}: {}", id, e);
                        HostMapping::new()
                    }
                }
            }
            (EventKind::Service, "update") if self.swarm_mode => {
                let Some(id) = event.actor_id.as_deref().filter(|id| !id.is_empty()) else {
                    debug!("Skip service update event without Actor.ID");
                    return HostMapping::new();
                };
                match self.runtime.inspect_service(id).await {
                    Ok(service) => self.labels.discover_service(&service),
                    Err(e) => {
                        warn!("Failed to inspect updated service {}: {}", id, e);
                        HostMapping::new()
                    }
                }
            }
            _ => HostMapping::new(),
        }
    }
}

enum WatcherState {
    Connecting,
    Streaming(EventStream),
    Backoff,
}

/// Long-lived consumer of container/service lifecycle events
pub struct EventWatcher {
    handler: EventHandler,
    reconnect_delay: Duration,
    cursor: DiscoveryCursor,
}

impl EventWatcher {
    pub fn new(handler: EventHandler, reconnect_delay: Duration) -> Self {
        Self {
            handler,
            reconnect_delay,
            cursor: DiscoveryCursor::now(),
        }
    }

    /// Start from an explicit cursor instead of "now"
    pub fn with_cursor(mut self, cursor: DiscoveryCursor) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn cursor(&self) -> DiscoveryCursor {
        self.cursor
    }

    /// Consume events until shutdown, feeding each event's mapping to the engine.
    ///
    /// Returns the final cursor.
    pub async fn run(
        mut self,
        engine: Arc<SyncEngine>,
        mut shutdown: watch::Receiver<bool>,
    ) -> DiscoveryCursor {
        info!("Starting event watcher");
        let mut state = WatcherState::Connecting;

        loop {
            state = match state {
                WatcherState::Connecting => {
                    debug!("Subscribing to runtime events since {}", self.cursor.timestamp());
                    WatcherState::Streaming(self.handler.runtime.events(self.cursor.timestamp()))
                }

                WatcherState::Streaming(mut stream) => {
                    tokio::select! {
                        item = stream.next() => match item {
                            Some(Ok(event)) => {
                                self.cursor.advance(event.time);
                                self.dispatch(event, &engine).await;
                                WatcherState::Streaming(stream)
                            }
                            Some(Err(e)) => {
                                error!("Event watcher error: {}", e);
                                WatcherState::Backoff
                            }
                            None => {
                                warn!("Event stream closed unexpectedly");
                                WatcherState::Backoff
                            }
                        },

                        _ = super::shutdown_requested(&mut shutdown) => break,
                    }
                }

                WatcherState::Backoff => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.reconnect_delay) => WatcherState::Connecting,
                        _ = super::shutdown_requested(&mut shutdown) => break,
                    }
                }
            };
        }

        info!("Event watcher stopped");
        self.cursor
    }

    /// Process one event in its own task so a panic cannot end the watcher
    async fn dispatch(&self, event: RuntimeEvent, engine: &Arc<SyncEngine>) {
        let handler = self.handler.clone();
        let engine = engine.clone();

        let task = tokio::spawn(async move {
            let mapping = handler.process(&event).await;
            if !mapping.is_empty() {
                engine.sync_mappings(&mapping).await;
            }
        });

        if let Err(e) = task.await {
            error!("Recovered panic in event-watcher: {}", e);
        }
    }
}
