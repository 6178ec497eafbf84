//! Host mappings and priority merge
//!
//! Every discovery pass produces a [`HostMapping`]: hostname → [`Priority`].
//! Mappings from different sources are merged by keeping the most
//! authoritative (numerically lowest) priority per hostname.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

/// Authority rank of a discovery source. Lower wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority(pub u8);

impl Priority {
    /// Direct container/service label discovery (scan and event stream)
    pub const DISCOVERY: Priority = Priority(1);

    /// Reverse-proxy router API polling
    pub const ROUTER_POLL: Priority = Priority(2);
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hostname → priority snapshot produced by one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostMapping {
    hosts: HashMap<String, Priority>,
}

impl HostMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a hostname, keeping the lower priority if already present
    pub fn insert(&mut self, host: impl Into<String>, priority: Priority) {
        match self.hosts.entry(host.into()) {
            Entry::Occupied(mut existing) => {
                if priority < *existing.get() {
                    existing.insert(priority);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(priority);
            }
        }
    }

    /// Merge another snapshot into this one
    pub fn merge(&mut self, other: HostMapping) {
        for (host, priority) in other.hosts {
            self.insert(host, priority);
        }
    }

    /// Priority recorded for a hostname
    pub fn get(&self, host: &str) -> Option<Priority> {
        self.hosts.get(host).copied()
    }

    /// Iterate over (hostname, priority) pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Priority)> {
        self.hosts.iter().map(|(host, priority)| (host.as_str(), *priority))
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl FromIterator<(String, Priority)> for HostMapping {
    fn from_iter<I: IntoIterator<Item = (String, Priority)>>(iter: I) -> Self {
        let mut mapping = HostMapping::new();
        for (host, priority) in iter {
            mapping.insert(host, priority);
        }
        mapping
    }
}

/// Merge any number of snapshots into one
pub fn merge_all(snapshots: impl IntoIterator<Item = HostMapping>) -> HostMapping {
    snapshots
        .into_iter()
        .fold(HostMapping::new(), |mut merged, snapshot| {
            merged.merge(snapshot);
            merged
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(host: &str, priority: Priority) -> HostMapping {
        let mut mapping = HostMapping::new();
        mapping.insert(host, priority);
        mapping
    }

    #[test]
    fn merge_keeps_lowest_priority_in_either_order() {
        let a = single("h.example.com", Priority::DISCOVERY);
        let b = single("h.example.com", Priority::ROUTER_POLL);

        let ab = merge_all([a.clone(), b.clone()]);
        let ba = merge_all([b, a]);

        assert_eq!(ab.get("h.example.com"), Some(Priority::DISCOVERY));
        assert_eq!(ab, ba);
    }

    #[test]
    fn merge_is_idempotent() {
        let a = single("h.example.com", Priority::ROUTER_POLL);
        let twice = merge_all([a.clone(), a.clone()]);
        assert_eq!(twice, a);
    }

    #[test]
    fn merge_unions_distinct_hosts() {
        let merged = merge_all([
            single("a.example.com", Priority::DISCOVERY),
            single("b.example.com", Priority::ROUTER_POLL),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("b.example.com"), Some(Priority::ROUTER_POLL));
    }

    #[test]
    fn insert_does_not_raise_priority() {
        let mut mapping = single("h", Priority::DISCOVERY);
        mapping.insert("h", Priority::ROUTER_POLL);
        assert_eq!(mapping.get("h"), Some(Priority::DISCOVERY));
    }

    #[test]
    fn empty_merge() {
        assert!(merge_all(Vec::new()).is_empty());
    }
}
