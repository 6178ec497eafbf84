//! Daemon configuration from environment variables and secret files
//!
//! ## Secrets
//!
//! A secret `NAME` is resolved from, in order:
//! 1. the file named by `NAME_FILE` or `name_file` (relative paths are also
//!    tried under each secret directory)
//! 2. `<secret dir>/NAME` and `<secret dir>/name`
//! 3. the env vars `NAME` and `name`
//!
//! Values are trimmed; the first non-empty one wins.
//!
//! ## Domains
//!
//! Every `DOMAIN{N}` variable (case-insensitive, sorted by key) declares one
//! domain with `_ZONE_ID` (secret, required), `_TTL`, `_TARGET_DOMAIN`,
//! `_PROXIED`, `_COMMENT` and `_EXCLUDED_SUB_DOMAINS` (CSV) siblings.

use anyhow::{Context, Result, bail};
use companion_core::{
    CompanionConfig, DomainConfig, HostFilter, LabelFilter, RuleSyntax, SyncOptions,
};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::Level;

/// Directory Docker and Kubernetes mount secrets into
const DEFAULT_SECRET_DIR: &str = "/run/secrets";

static DOMAIN_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^DOMAIN[0-9]+$").expect("valid domain key pattern"));
static INCLUDED_HOST_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^TRAEFIK_INCLUDED_HOST[0-9]+$").expect("valid include key pattern")
});
static EXCLUDED_HOST_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^TRAEFIK_EXCLUDED_HOST[0-9]+$").expect("valid exclude key pattern")
});

/// Snapshot of the process environment plus where to look for secret files
#[derive(Debug, Clone)]
pub struct Env {
    vars: HashMap<String, String>,
    secret_dirs: Vec<PathBuf>,
}

impl Env {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self::new(std::env::vars().collect(), vec![PathBuf::from(DEFAULT_SECRET_DIR)])
    }

    pub fn new(vars: HashMap<String, String>, secret_dirs: Vec<PathBuf>) -> Self {
        Self { vars, secret_dirs }
    }

    /// Raw value, empty counts as unset
    fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn string_or(&self, name: &str, default: &str) -> String {
        match self.get(name) {
            Some(value) if !value.trim().is_empty() => value.to_string(),
            _ => default.to_string(),
        }
    }

    /// `true`/`false` in any case; anything else is the default
    fn bool_or(&self, name: &str, default: bool) -> bool {
        match self.get(name).map(str::to_lowercase).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }

    fn int_or<T: std::str::FromStr>(&self, name: &str, default: T) -> T {
        self.get(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Resolve a secret from files or the environment
    pub fn secret(&self, name: &str) -> Option<String> {
        let lower = name.to_lowercase();

        let file_specs = [format!("{}_FILE", name), format!("{}_FILE", lower)];
        for spec in &file_specs {
            if let Some(value) = self.get(spec).and_then(|s| self.read_secret_spec(s)) {
                return Some(value);
            }
        }

        for dir in &self.secret_dirs {
            for file in [name, lower.as_str()] {
                if let Some(value) = read_trimmed(&dir.join(file)) {
                    return Some(value);
                }
            }
        }

        [name, lower.as_str()]
            .into_iter()
            .filter_map(|key| self.get(key))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn read_secret_spec(&self, spec: &str) -> Option<String> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }

        let path = Path::new(spec);
        if let Some(value) = read_trimmed(path) {
            return Some(value);
        }
        if path.is_absolute() {
            return None;
        }

        self.secret_dirs
            .iter()
            .find_map(|dir| read_trimmed(&dir.join(spec)))
    }

    /// Names of all variables matching `pattern`, sorted
    fn keys_matching(&self, pattern: &Regex) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .vars
            .keys()
            .map(String::as_str)
            .filter(|k| pattern.is_match(k))
            .collect();
        keys.sort_unstable();
        keys
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let value = contents.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn split_clean_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Absolute URI with scheme and host
fn valid_uri(raw: &str) -> bool {
    url::Url::parse(raw)
        .is_ok_and(|u| !u.scheme().is_empty() && u.host_str().is_some_and(|h| !h.is_empty()))
}

/// Map `LOG_LEVEL` to a tracing level; unknown values mean INFO
pub fn parse_log_level(raw: &str) -> Level {
    match raw.trim().to_uppercase().as_str() {
        "VERBOSE" | "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "INFO" | "NOTICE" => Level::INFO,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Traefik API connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraefikSettings {
    pub url: String,
    pub ca_cert_file: Option<PathBuf>,
    pub insecure_skip_verify: bool,
}

/// Fully resolved daemon configuration
#[derive(Debug)]
pub struct DaemonConfig {
    /// Core configuration handed to the companion
    pub companion: CompanionConfig,

    /// ⚠️ NEVER log this value
    pub cf_token: String,

    /// Account email for global API key authentication
    pub cf_email: Option<String>,

    /// Present when router polling is enabled
    pub traefik: Option<TraefikSettings>,

    pub log_level: Level,

    /// Non-fatal problems found while loading; logged once logging is up
    pub warnings: Vec<String>,
}

impl DaemonConfig {
    /// Load and validate the configuration
    pub fn from_env(env: &Env) -> Result<Self> {
        let log_level = parse_log_level(&env.string_or("LOG_LEVEL", "INFO"));

        let default_ttl: u32 = env.int_or("DEFAULT_TTL", 1);
        let traefik_version = env.string_or("TRAEFIK_VERSION", "2");

        let filter_label = env.string_or("TRAEFIK_FILTER_LABEL", "traefik.constraint");
        Regex::new(&filter_label).context("invalid TRAEFIK_FILTER_LABEL regex")?;
        let filter = match env.get("TRAEFIK_FILTER") {
            Some(raw) => Some(
                LabelFilter::new(&filter_label, raw).context("invalid TRAEFIK_FILTER regex")?,
            ),
            None => None,
        };

        let cf_email = env.secret("CF_EMAIL");
        let Some(cf_token) = env.secret("CF_TOKEN") else {
            bail!("CF_TOKEN not defined");
        };

        let Some(target) = env.get("TARGET_DOMAIN").map(str::to_string) else {
            bail!("TARGET_DOMAIN not defined");
        };

        let domains = load_domains(env, default_ttl, &target)?;
        if domains.is_empty() {
            bail!("DOMAIN1 not defined");
        }

        let enable_docker = env.bool_or("ENABLE_DOCKER_POLL", true);
        let swarm_mode = env.bool_or("DOCKER_SWARM_MODE", false);
        if swarm_mode && !enable_docker {
            bail!("cannot enable DOCKER_SWARM_MODE without ENABLE_DOCKER_POLL=true");
        }

        let hosts = load_host_filter(env)?;

        let mut warnings = Vec::new();
        let mut traefik = None;
        if env.bool_or("ENABLE_TRAEFIK_POLL", false) {
            let url = env.get("TRAEFIK_POLL_URL").unwrap_or_default().to_string();
            if traefik_version != "2" {
                warnings.push(format!(
                    "Router polling disabled: TRAEFIK_VERSION={} is not supported",
                    traefik_version
                ));
            } else if !valid_uri(&url) {
                warnings.push(format!(
                    "Router polling disabled: invalid TRAEFIK_POLL_URL {:?}",
                    url
                ));
            } else {
                traefik = Some(TraefikSettings {
                    url,
                    ca_cert_file: env
                        .get("TRAEFIK_POLL_CA_CERT_FILE")
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from),
                    insecure_skip_verify: env.bool_or("TRAEFIK_POLL_INSECURE_SKIP_VERIFY", false),
                });
            }
        }

        let mut companion = CompanionConfig::new(domains);
        companion.sync = SyncOptions {
            record_type: env.string_or("RC_TYPE", "CNAME"),
            dry_run: env.bool_or("DRY_RUN", false),
            refresh_entries: env.bool_or("REFRESH_ENTRIES", false),
        };
        companion.docker.enabled = enable_docker;
        companion.docker.swarm_mode = swarm_mode;
        companion.docker.rule_syntax =
            RuleSyntax::from_version(&traefik_version).unwrap_or_default();
        companion.docker.filter = filter;
        companion.router_poll.enabled = traefik.is_some();
        companion.router_poll.interval =
            Duration::from_secs(env.int_or("TRAEFIK_POLL_SECONDS", 60u64));
        companion.router_poll.hosts = hosts;

        companion.validate()?;

        Ok(Self {
            companion,
            cf_token,
            cf_email,
            traefik,
            log_level,
            warnings,
        })
    }
}

fn load_domains(env: &Env, default_ttl: u32, target: &str) -> Result<Vec<DomainConfig>> {
    let mut domains = Vec::new();

    for key in env.keys_matching(&DOMAIN_KEY) {
        let name = env.get(key).unwrap_or_default();
        let zone_key = format!("{}_ZONE_ID", key);
        let Some(zone_id) = env.secret(&zone_key) else {
            bail!("{} is not set", zone_key);
        };

        let mut domain = DomainConfig::new(
            name,
            zone_id,
            env.string_or(&format!("{}_TARGET_DOMAIN", key), target),
        )
        .with_ttl(env.int_or(&format!("{}_TTL", key), default_ttl))
        .with_proxied(env.bool_or(&format!("{}_PROXIED", key), false))
        .with_excluded_sub_domains(split_clean_csv(
            env.get(&format!("{}_EXCLUDED_SUB_DOMAINS", key)).unwrap_or_default(),
        ));
        if let Some(comment) = env.get(&format!("{}_COMMENT", key)) {
            domain = domain.with_comment(comment);
        }

        domains.push(domain);
    }

    Ok(domains)
}

fn load_host_filter(env: &Env) -> Result<HostFilter> {
    let patterns = |pattern: &Regex| -> Vec<(String, String)> {
        env.keys_matching(pattern)
            .into_iter()
            .map(|k| (k.to_string(), env.vars.get(k).cloned().unwrap_or_default()))
            .collect()
    };

    let mut include = Vec::new();
    for (key, value) in patterns(&INCLUDED_HOST_KEY) {
        include.push(Regex::new(&value).with_context(|| format!("invalid {} regex", key))?);
    }
    let mut exclude = Vec::new();
    for (key, value) in patterns(&EXCLUDED_HOST_KEY) {
        exclude.push(Regex::new(&value).with_context(|| format!("invalid {} regex", key))?);
    }

    Ok(HostFilter { include, exclude })
}
