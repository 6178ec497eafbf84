// # companiond - DNS Companion Daemon
//
// Thin integration layer: all discovery and reconciliation logic lives in
// companion-core.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables and secret files
// 2. Initializing logging and the runtime
// 3. Building the Cloudflare provider, Docker runtime and Traefik client
// 4. Running the companion until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Cloudflare
// - `CF_TOKEN`: API token (or global API key with `CF_EMAIL`), secret
// - `CF_EMAIL`: Account email, secret, optional
//
// ### Records
// - `TARGET_DOMAIN`: Default record content
// - `DOMAIN{N}`, `DOMAIN{N}_ZONE_ID`, `DOMAIN{N}_TTL`, `DOMAIN{N}_TARGET_DOMAIN`,
//   `DOMAIN{N}_PROXIED`, `DOMAIN{N}_COMMENT`, `DOMAIN{N}_EXCLUDED_SUB_DOMAINS`
// - `RC_TYPE`, `DEFAULT_TTL`, `DRY_RUN`, `REFRESH_ENTRIES`
//
// ### Discovery
// - `ENABLE_DOCKER_POLL`, `DOCKER_SWARM_MODE`, `TRAEFIK_VERSION`
// - `TRAEFIK_FILTER`, `TRAEFIK_FILTER_LABEL`
// - `ENABLE_TRAEFIK_POLL`, `TRAEFIK_POLL_URL`, `TRAEFIK_POLL_SECONDS`,
//   `TRAEFIK_POLL_CA_CERT_FILE`, `TRAEFIK_POLL_INSECURE_SKIP_VERIFY`
// - `TRAEFIK_INCLUDED_HOST{N}`, `TRAEFIK_EXCLUDED_HOST{N}`
//
// ### Logging
// - `LOG_LEVEL`: VERBOSE, DEBUG, INFO/NOTICE, WARN/WARNING, ERROR
//
// ## Example
//
// ```bash
// export CF_TOKEN_FILE=/run/secrets/cf_token
// export TARGET_DOMAIN=lb.example.net
// export DOMAIN1=example.com
// export DOMAIN1_ZONE_ID=0123456789abcdef
//
// companiond
// ```

mod config;

use companion_core::traits::{ContainerRuntime, DnsProvider, RouterSource};
use companion_core::Companion;
use companion_provider_cloudflare::CloudflareProvider;
use config::{DaemonConfig, Env};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound for the discovery loops to wind down after a signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum CompanionExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<CompanionExitCode> for ExitCode {
    fn from(code: CompanionExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match DaemonConfig::from_env(&Env::from_process()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return CompanionExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CompanionExitCode::ConfigError.into();
    }

    info!("Starting companiond");
    for warning in &config.warnings {
        warn!("{}", warning);
    }
    log_config(&config);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CompanionExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

fn log_config(config: &DaemonConfig) {
    let companion = &config.companion;

    if companion.sync.dry_run {
        warn!("Dry Run: {}", companion.sync.dry_run);
    }
    debug!("Docker Polling: {}", companion.docker.enabled);
    debug!("Swarm Mode: {}", companion.docker.swarm_mode);
    debug!("Refresh Entries: {}", companion.sync.refresh_entries);
    debug!("Rule Syntax: {:?}", companion.docker.rule_syntax);
    for domain in &companion.domains {
        debug!(
            "Domain {} -> {} (ttl {}, proxied {})",
            domain.name, domain.target, domain.ttl, domain.proxied
        );
    }

    if let Some(traefik) = &config.traefik {
        debug!("Traefik Poll Url: {}", traefik.url);
        debug!("Traefik Poll Seconds: {}", companion.router_poll.interval.as_secs());
        debug!("Traefik Poll CA Cert File: {:?}", traefik.ca_cert_file);
        debug!("Traefik Poll Insecure Skip Verify: {}", traefik.insecure_skip_verify);
    }
}

/// Build the collaborators, run the companion and map the outcome to an exit code
async fn run_daemon(config: DaemonConfig) -> CompanionExitCode {
    let DaemonConfig {
        companion: companion_config,
        cf_token,
        cf_email,
        traefik,
        ..
    } = config;

    let provider: Arc<dyn DnsProvider> = match CloudflareProvider::new(cf_token, cf_email) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            error!("Failed to initialize Cloudflare API: {}", e);
            return CompanionExitCode::ConfigError;
        }
    };

    let runtime = match container_runtime(companion_config.docker.enabled) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to initialize container runtime: {}", e);
            return CompanionExitCode::ConfigError;
        }
    };

    let routers = match router_source(traefik.as_ref()) {
        Ok(routers) => routers,
        Err(e) => {
            error!("Failed to initialize Traefik client: {}", e);
            return CompanionExitCode::ConfigError;
        }
    };

    let companion = match Companion::new(companion_config, provider, runtime, routers) {
        Ok(companion) => companion,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return CompanionExitCode::ConfigError;
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut task = tokio::spawn(companion.run(shutdown_rx));

    tokio::select! {
        signal = wait_for_shutdown() => {
            match signal {
                Ok(name) => info!("Received shutdown signal: {}", name),
                Err(e) => error!("Signal handling failed, shutting down: {}", e),
            }
        }

        result = &mut task => {
            return match result {
                Ok(Ok(())) => CompanionExitCode::CleanShutdown,
                Ok(Err(e)) => {
                    error!("{}", e);
                    CompanionExitCode::ConfigError
                }
                Err(e) => {
                    error!("Companion task failed: {}", e);
                    CompanionExitCode::RuntimeError
                }
            };
        }
    }

    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
        Ok(Ok(Ok(()))) => {
            info!("Shutdown complete");
            CompanionExitCode::CleanShutdown
        }
        Ok(Ok(Err(e))) => {
            error!("{}", e);
            CompanionExitCode::ConfigError
        }
        Ok(Err(e)) => {
            error!("Companion task failed: {}", e);
            CompanionExitCode::RuntimeError
        }
        Err(_) => {
            error!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT);
            CompanionExitCode::RuntimeError
        }
    }
}

#[cfg(feature = "docker")]
fn container_runtime(enabled: bool) -> anyhow::Result<Option<Arc<dyn ContainerRuntime>>> {
    if !enabled {
        return Ok(None);
    }
    let runtime = companion_docker::DockerRuntime::connect()?;
    Ok(Some(Arc::new(runtime)))
}

#[cfg(not(feature = "docker"))]
fn container_runtime(enabled: bool) -> anyhow::Result<Option<Arc<dyn ContainerRuntime>>> {
    if enabled {
        anyhow::bail!("built without Docker support; set ENABLE_DOCKER_POLL=false");
    }
    Ok(None)
}

#[cfg(feature = "traefik")]
fn router_source(
    settings: Option<&config::TraefikSettings>,
) -> anyhow::Result<Option<Arc<dyn RouterSource>>> {
    let Some(settings) = settings else {
        return Ok(None);
    };
    let client = companion_traefik::TraefikClient::new(
        &settings.url,
        settings.ca_cert_file.as_deref(),
        settings.insecure_skip_verify,
    )?;
    Ok(Some(Arc::new(client)))
}

#[cfg(not(feature = "traefik"))]
fn router_source(
    settings: Option<&config::TraefikSettings>,
) -> anyhow::Result<Option<Arc<dyn RouterSource>>> {
    if settings.is_some() {
        anyhow::bail!("built without Traefik support; set ENABLE_TRAEFIK_POLL=false");
    }
    Ok(None)
}

/// Wait for SIGTERM or SIGINT
///
/// # Returns
///
/// The name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> anyhow::Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> anyhow::Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
