//! Hostname extraction from Traefik routing rules
//!
//! Two rule dialects are understood:
//!
//! - **Legacy** (Traefik v1 `frontend.rule` labels): `Host:a.example.com,b.example.com`
//! - **Modern** (Traefik v2 `*.rule` labels and router API): ``Host(`a.example.com`) && PathPrefix(`/api`)``
//!
//! Both parsers are total: malformed input yields an empty vector.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// `Host(...)` call with its argument list. Does not match `HostRegexp(` or `HostSNI(`.
static HOST_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bHost\(([^)]*)\)").expect("static pattern"));

/// A single backtick-quoted hostname token.
static QUOTED_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([a-zA-Z0-9.\-]+)`").expect("static pattern"));

static LEGACY_RULE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"traefik.*.frontend.rule").expect("static pattern"));

static MODERN_RULE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"traefik.*?\.rule").expect("static pattern"));

/// Routing-rule dialect used by container/service labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSyntax {
    /// Traefik v1 `Host:a,b` rules
    Legacy,
    /// Traefik v2 ``Host(`a`)`` rules
    #[default]
    Modern,
}

impl RuleSyntax {
    /// Map a Traefik major version string ("1", "2") to a syntax
    pub fn from_version(version: &str) -> Option<Self> {
        match version.trim() {
            "1" => Some(Self::Legacy),
            "2" => Some(Self::Modern),
            _ => None,
        }
    }

    /// Whether a label key carries a routing rule in this dialect
    pub fn is_rule_label(&self, key: &str) -> bool {
        match self {
            Self::Legacy => LEGACY_RULE_LABEL.is_match(key),
            Self::Modern => MODERN_RULE_LABEL.is_match(key),
        }
    }

    /// Extract hostnames from a label value in this dialect
    pub fn parse(&self, value: &str) -> Vec<String> {
        match self {
            Self::Legacy => parse_legacy_host_rule(value),
            Self::Modern => {
                if !value.contains("Host") {
                    return Vec::new();
                }
                parse_host_rule(value)
            }
        }
    }
}

/// Parse a legacy `Host:a,b,c` rule into `["a", "b", "c"]`.
///
/// Tokens are trimmed and empty tokens dropped. Without a `Host:` prefix the
/// result is empty.
pub fn parse_legacy_host_rule(rule: &str) -> Vec<String> {
    let Some(idx) = rule.find("Host:") else {
        return Vec::new();
    };

    rule[idx + "Host:".len()..]
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .collect()
}

/// Parse every backtick-quoted hostname passed to a `Host(...)` predicate.
///
/// Hostnames are returned left to right. Other predicates combined through
/// `&&` / `||` are ignored, so ``Host(`a`) && PathPrefix(`/x`)`` yields `["a"]`.
pub fn parse_host_rule(rule: &str) -> Vec<String> {
    HOST_CALL
        .captures_iter(rule)
        .filter_map(|call| call.get(1))
        .flat_map(|args| {
            QUOTED_HOST
                .captures_iter(args.as_str())
                .filter_map(|token| token.get(1))
                .map(|m| m.as_str().to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}
