// # companion-core
//
// Core library of the DNS companion: keeps provider DNS records in step with
// the hostnames declared by a container runtime and a reverse proxy.
//
// ## Architecture Overview
//
// - **ContainerRuntime**: Trait for listing, inspecting and watching containers/services
// - **RouterSource**: Trait for fetching the reverse proxy's routing table
// - **DnsProvider**: Trait for listing, creating and updating DNS records
// - **SyncEngine**: Reconciles hostname mappings against the provider
// - **SyncedState**: Per-hostname record of the strongest source already synced
// - **Companion**: Startup scan, then event watcher and router poller until shutdown
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from runtime, proxy and provider clients
// 2. **Priority-Aware**: A weaker source never overrides a stronger one for the same hostname
// 3. **Never Delete**: Records are only created or updated
// 4. **Library-First**: All core functionality can be used as a library

pub mod companion;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod parser;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use companion::Companion;
pub use config::{
    CompanionConfig, DockerDiscoveryConfig, DomainConfig, HostFilter, LabelFilter,
    RouterPollConfig, SyncOptions,
};
pub use discovery::{DiscoveryCursor, EventWatcher, LabelDiscovery, RouterPoller, SnapshotScan};
pub use engine::{SyncEngine, SyncReport};
pub use error::{Error, Result};
pub use mapping::{HostMapping, Priority};
pub use parser::RuleSyntax;
pub use state::SyncedState;
pub use traits::{ContainerRuntime, DnsProvider, RouterSource};
