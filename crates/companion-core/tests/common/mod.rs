//! Test doubles and common utilities for contract tests
//!
//! The doubles record every call so tests can assert on what the companion
//! did without any network or container runtime.

#![allow(dead_code)]

use async_trait::async_trait;
use companion_core::error::{Error, Result};
use companion_core::traits::{
    ContainerInfo, ContainerRuntime, DesiredRecord, DnsProvider, EventKind, EventStream, Labels,
    RemoteRecord, Router, RouterFetch, RouterSource, RuntimeEvent, ServiceInfo,
};
use companion_core::{CompanionConfig, DomainConfig};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// In-memory DNS provider that records every call
#[derive(Clone, Default)]
pub struct RecordingProvider {
    records: Arc<Mutex<HashMap<(String, String), Vec<RemoteRecord>>>>,
    created: Arc<Mutex<Vec<(String, DesiredRecord)>>>,
    updated: Arc<Mutex<Vec<(String, String, DesiredRecord)>>>,
    list_calls: Arc<AtomicUsize>,
    list_failures: Arc<AtomicUsize>,
    list_delay: Arc<Mutex<Duration>>,
    next_id: Arc<AtomicUsize>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing record
    pub fn with_record(self, zone_id: &str, name: &str, id: &str, content: &str) -> Self {
        self.records
            .lock()
            .unwrap()
            .entry((zone_id.to_string(), name.to_string()))
            .or_default()
            .push(RemoteRecord {
                id: id.to_string(),
                content: content.to_string(),
            });
        self
    }

    /// Make the next `count` list calls fail
    pub fn fail_next_lists(&self, count: usize) {
        self.list_failures.store(count, Ordering::SeqCst);
    }

    /// Delay every list call by `delay`
    pub fn slow_lists(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = delay;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<(String, DesiredRecord)> {
        self.created.lock().unwrap().clone()
    }

    pub fn created_names(&self) -> Vec<String> {
        self.created().into_iter().map(|(_, r)| r.name).collect()
    }

    pub fn updated(&self) -> Vec<(String, String, DesiredRecord)> {
        self.updated.lock().unwrap().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.created.lock().unwrap().len() + self.updated.lock().unwrap().len()
    }
}

#[async_trait]
impl DnsProvider for RecordingProvider {
    async fn list_records(&self, zone_id: &str, name: &str) -> Result<Vec<RemoteRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.list_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.list_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.list_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::provider("recording", "simulated list failure"));
        }

        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(zone_id.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_record(&self, zone_id: &str, record: &DesiredRecord) -> Result<RemoteRecord> {
        let id = format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let remote = RemoteRecord {
            id,
            content: record.content.clone(),
        };

        self.created
            .lock()
            .unwrap()
            .push((zone_id.to_string(), record.clone()));
        self.records
            .lock()
            .unwrap()
            .entry((zone_id.to_string(), record.name.clone()))
            .or_default()
            .push(remote.clone());

        Ok(remote)
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record: &DesiredRecord,
    ) -> Result<RemoteRecord> {
        self.updated.lock().unwrap().push((
            zone_id.to_string(),
            record_id.to_string(),
            record.clone(),
        ));

        Ok(RemoteRecord {
            id: record_id.to_string(),
            content: record.content.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Scripted container runtime
///
/// Every `events` call takes the next queued stream; when none is queued the
/// subscription stays silent forever.
#[derive(Clone, Default)]
pub struct ScriptedRuntime {
    containers: Arc<Mutex<Vec<ContainerInfo>>>,
    services: Arc<Mutex<Vec<ServiceInfo>>>,
    broken_containers: Arc<Mutex<Vec<String>>>,
    panicking_containers: Arc<Mutex<Vec<String>>>,
    list_fails: Arc<AtomicBool>,
    streams: Arc<Mutex<VecDeque<mpsc::UnboundedReceiver<Result<RuntimeEvent>>>>>,
    subscriptions: Arc<Mutex<Vec<i64>>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_container(&self, id: &str, labels: Labels) {
        self.containers.lock().unwrap().push(ContainerInfo {
            id: id.to_string(),
            labels,
        });
    }

    pub fn add_service(&self, service: ServiceInfo) {
        self.services.lock().unwrap().push(service);
    }

    /// Listed but fails inspection
    pub fn add_broken_container(&self, id: &str) {
        self.broken_containers.lock().unwrap().push(id.to_string());
    }

    /// Inspecting this container panics
    pub fn add_panicking_container(&self, id: &str) {
        self.panicking_containers.lock().unwrap().push(id.to_string());
    }

    pub fn fail_listing(&self) {
        self.list_fails.store(true, Ordering::SeqCst);
    }

    /// Queue a stream for the next subscription and return its feeding end
    pub fn push_stream(&self) -> mpsc::UnboundedSender<Result<RuntimeEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(rx);
        tx
    }

    /// `since` of every subscription so far
    pub fn subscriptions(&self) -> Vec<i64> {
        self.subscriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for ScriptedRuntime {
    async fn list_containers(&self) -> Result<Vec<String>> {
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(Error::runtime("daemon unreachable"));
        }

        let mut ids: Vec<String> = self
            .containers
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.id.clone())
            .collect();
        ids.extend(self.broken_containers.lock().unwrap().iter().cloned());
        Ok(ids)
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInfo> {
        let panics = self.panicking_containers.lock().unwrap().iter().any(|c| c == id);
        if panics {
            panic!("inspect of {} blew up", id);
        }

        self.containers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::runtime(format!("no such container: {}", id)))
    }

    async fn list_services(&self) -> Result<Vec<ServiceInfo>> {
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(Error::runtime("daemon unreachable"));
        }
        Ok(self.services.lock().unwrap().clone())
    }

    async fn inspect_service(&self, id: &str) -> Result<ServiceInfo> {
        self.services
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| Error::runtime(format!("no such service: {}", id)))
    }

    fn events(&self, since: i64) -> EventStream {
        self.subscriptions.lock().unwrap().push(since);

        match self.streams.lock().unwrap().pop_front() {
            Some(rx) => Box::pin(UnboundedReceiverStream::new(rx)),
            None => Box::pin(tokio_stream::pending()),
        }
    }
}

/// Router source returning a fixed routing table
#[derive(Clone)]
pub struct StaticRouterSource {
    routers: Arc<Mutex<Vec<Router>>>,
    fetches: Arc<AtomicUsize>,
    panic_next: Arc<AtomicBool>,
}

impl StaticRouterSource {
    pub fn new(routers: Vec<Router>) -> Self {
        Self {
            routers: Arc::new(Mutex::new(routers)),
            fetches: Arc::new(AtomicUsize::new(0)),
            panic_next: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_routers(&self, routers: Vec<Router>) {
        *self.routers.lock().unwrap() = routers;
    }

    /// Make the next fetch panic
    pub fn panic_next_fetch(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouterSource for StaticRouterSource {
    async fn fetch_routers(&self) -> Result<RouterFetch> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("router table fetch blew up");
        }
        Ok(RouterFetch::Routers(self.routers.lock().unwrap().clone()))
    }

    fn endpoint(&self) -> String {
        "static://routers".to_string()
    }
}

pub const ZONE: &str = "zone-1";
pub const TARGET: &str = "lb.example.net";

/// Single-domain configuration with container discovery enabled and fast reconnects
pub fn minimal_config() -> CompanionConfig {
    let mut config = CompanionConfig::new(vec![DomainConfig::new("example.com", ZONE, TARGET)]);
    config.docker.reconnect_delay = Duration::from_millis(20);
    config
}

/// Labels declaring one modern router rule
pub fn rule_labels(host: &str) -> Labels {
    let mut labels = Labels::new();
    labels.insert(
        "traefik.http.routers.web.rule".to_string(),
        format!("Host(`{}`)", host),
    );
    labels
}

pub fn router(name: &str, host: &str) -> Router {
    Router {
        name: name.to_string(),
        rule: format!("Host(`{}`)", host),
        status: "enabled".to_string(),
    }
}

pub fn start_event(id: &str, time: i64) -> RuntimeEvent {
    RuntimeEvent::new(EventKind::Container, "start", Some(id.to_string()), time)
}

/// Poll `check` until it holds or `timeout` elapses
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
