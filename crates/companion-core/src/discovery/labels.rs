//! Label-based hostname discovery for a single container or service

use tracing::trace;

use crate::config::LabelFilter;
use crate::mapping::{HostMapping, Priority};
use crate::parser::RuleSyntax;
use crate::traits::{Labels, ServiceInfo};

/// Runs the rule parsers over an entity's routing labels
#[derive(Debug, Clone, Default)]
pub struct LabelDiscovery {
    syntax: RuleSyntax,
    filter: Option<LabelFilter>,
}

impl LabelDiscovery {
    pub fn new(syntax: RuleSyntax, filter: Option<LabelFilter>) -> Self {
        Self { syntax, filter }
    }

    /// Whether an entity's labels pass the configured filter
    pub fn passes_filter(&self, labels: &Labels) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };

        labels
            .iter()
            .any(|(key, value)| filter.key.is_match(key) && filter.value.is_match(value))
    }

    /// Hostnames declared by an entity's labels, at discovery priority
    pub fn discover(&self, kind: &str, id: &str, labels: &Labels) -> HostMapping {
        let mut mapping = HostMapping::new();
        if !self.passes_filter(labels) {
            return mapping;
        }

        for (key, value) in labels {
            if !self.syntax.is_rule_label(key) {
                continue;
            }
            for host in self.syntax.parse(value) {
                trace!("Found {} ID: {} with Hostname {}", kind, id, host);
                mapping.insert(host, Priority::DISCOVERY);
            }
        }

        mapping
    }

    /// Hostnames declared by a service.
    ///
    /// Legacy rules live on the task template's container spec, modern rules
    /// on the service spec.
    pub fn discover_service(&self, service: &ServiceInfo) -> HostMapping {
        match self.syntax {
            RuleSyntax::Legacy => match &service.container_labels {
                Some(labels) => self.discover("Service", &service.id, labels),
                None => HostMapping::new(),
            },
            RuleSyntax::Modern => self.discover("Service", &service.id, &service.labels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn modern_labels_yield_discovery_priority() {
        let discovery = LabelDiscovery::new(RuleSyntax::Modern, None);
        let mapping = discovery.discover(
            "Container",
            "abc",
            &labels(&[
                ("traefik.http.routers.web.rule", "Host(`a.example.com`)"),
                ("traefik.enable", "true"),
            ]),
        );

        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("a.example.com"), Some(Priority::DISCOVERY));
    }

    #[test]
    fn legacy_labels() {
        let discovery = LabelDiscovery::new(RuleSyntax::Legacy, None);
        let mapping = discovery.discover(
            "Container",
            "abc",
            &labels(&[("traefik.web.frontend.rule", "Host:a.example.com,b.example.com")]),
        );

        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn filter_requires_matching_key_and_value() {
        let filter = LabelFilter::new("traefik.constraint", "^public$").unwrap();
        let discovery = LabelDiscovery::new(RuleSyntax::Modern, Some(filter));

        let rule = ("traefik.http.routers.web.rule", "Host(`a.example.com`)");

        let rejected = discovery.discover(
            "Container",
            "abc",
            &labels(&[rule, ("traefik.constraint", "private")]),
        );
        assert!(rejected.is_empty());

        let accepted = discovery.discover(
            "Container",
            "abc",
            &labels(&[rule, ("traefik.constraint", "public")]),
        );
        assert_eq!(accepted.len(), 1);
    }

    #[test]
    fn legacy_service_uses_container_spec_labels() {
        let discovery = LabelDiscovery::new(RuleSyntax::Legacy, None);
        let service = ServiceInfo {
            id: "svc".to_string(),
            labels: labels(&[("traefik.web.frontend.rule", "Host:spec.example.com")]),
            container_labels: Some(labels(&[(
                "traefik.web.frontend.rule",
                "Host:task.example.com",
            )])),
        };

        let mapping = discovery.discover_service(&service);
        assert!(mapping.get("task.example.com").is_some());
        assert!(mapping.get("spec.example.com").is_none());

        let without_task = ServiceInfo {
            container_labels: None,
            ..service
        };
        assert!(discovery.discover_service(&without_task).is_empty());
    }
}
