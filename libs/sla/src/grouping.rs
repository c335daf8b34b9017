//! Host grouping functions.
//!
//! A grouping partitions a set of hosts into named groups that are treated
//! as one failure domain (a host, a rack, a whole cluster). Groupings are
//! looked up by name in an explicit [`Groupings`] registry.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::{SlaError, SlaResult};

/// Groups hosts by host name.
pub const GROUP_BY_HOST: &str = "by_host";

/// Puts every host in one group.
pub const GROUP_NONE: &str = "none";

/// Key of the single group produced by [`SingleGroup`].
pub const ALL_HOSTS_GROUP: &str = "_all_hosts_";

/// Host groups keyed by group name, in key order.
pub type HostGroups = BTreeMap<String, BTreeSet<String>>;

/// Partitions hosts into failure domains.
pub trait HostGrouping: Send + Sync {
    fn group(&self, hosts: &BTreeSet<String>) -> HostGroups;
}

/// One group per host, keyed by the host name.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerHost;

impl HostGrouping for PerHost {
    fn group(&self, hosts: &BTreeSet<String>) -> HostGroups {
        hosts
            .iter()
            .map(|host| (host.clone(), BTreeSet::from([host.clone()])))
            .collect()
    }
}

/// A single group holding every host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleGroup;

impl HostGrouping for SingleGroup {
    fn group(&self, hosts: &BTreeSet<String>) -> HostGroups {
        if hosts.is_empty() {
            return HostGroups::new();
        }
        BTreeMap::from([(ALL_HOSTS_GROUP.to_string(), hosts.clone())])
    }
}

/// Groups hosts by a key derived from each host name.
///
/// ```
/// use std::collections::BTreeSet;
///
/// use drover_sla::{HostGrouping, KeyFn};
///
/// let by_rack = KeyFn::new(|host: &str| host.split('-').nth(1).unwrap_or(host).to_string());
/// let hosts: BTreeSet<String> = ["h-r1-1", "h-r1-2", "h-r2-1"]
///     .iter()
///     .map(|h| h.to_string())
///     .collect();
/// assert_eq!(by_rack.group(&hosts).len(), 2);
/// ```
pub struct KeyFn<F> {
    key: F,
}

impl<F> KeyFn<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    pub fn new(key: F) -> Self {
        Self { key }
    }
}

impl<F> HostGrouping for KeyFn<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn group(&self, hosts: &BTreeSet<String>) -> HostGroups {
        let mut groups = HostGroups::new();
        for host in hosts {
            groups
                .entry((self.key)(host))
                .or_default()
                .insert(host.clone());
        }
        groups
    }
}

/// Run a grouping and check that its output partitions `hosts`.
pub fn partition(
    name: &str,
    grouping: &dyn HostGrouping,
    hosts: &BTreeSet<String>,
) -> SlaResult<HostGroups> {
    let groups = grouping.group(hosts);
    let mut seen = BTreeSet::new();

    for (key, members) in &groups {
        if members.is_empty() {
            return Err(invalid_partition(name, format!("group '{key}' is empty")));
        }
        for host in members {
            if !hosts.contains(host) {
                return Err(invalid_partition(name, format!("unknown host '{host}'")));
            }
            if !seen.insert(host.as_str()) {
                return Err(invalid_partition(
                    name,
                    format!("host '{host}' appears in more than one group"),
                ));
            }
        }
    }

    if seen.len() != hosts.len() {
        let missing = hosts
            .iter()
            .find(|host| !seen.contains(host.as_str()))
            .map(String::as_str)
            .unwrap_or_default();
        return Err(invalid_partition(name, format!("host '{missing}' is not grouped")));
    }

    Ok(groups)
}

fn invalid_partition(grouping: &str, reason: String) -> SlaError {
    SlaError::InvalidPartition {
        grouping: grouping.to_string(),
        reason,
    }
}

/// A grouping resolved from the registry, carrying its name for diagnostics.
#[derive(Clone)]
pub struct NamedGrouping {
    name: String,
    grouping: Arc<dyn HostGrouping>,
}

impl NamedGrouping {
    pub fn new(name: impl Into<String>, grouping: Arc<dyn HostGrouping>) -> Self {
        Self {
            name: name.into(),
            grouping,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Partition `hosts`, validating the result.
    pub fn partition(&self, hosts: &BTreeSet<String>) -> SlaResult<HostGroups> {
        partition(&self.name, self.grouping.as_ref(), hosts)
    }
}

impl fmt::Debug for NamedGrouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedGrouping").field("name", &self.name).finish()
    }
}

/// Registry of groupings by name.
///
/// The default registry holds [`GROUP_BY_HOST`] and [`GROUP_NONE`].
#[derive(Clone)]
pub struct Groupings {
    entries: BTreeMap<String, Arc<dyn HostGrouping>>,
}

impl Groupings {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register or replace a grouping.
    pub fn register(&mut self, name: impl Into<String>, grouping: impl HostGrouping + 'static) {
        self.entries.insert(name.into(), Arc::new(grouping));
    }

    pub fn get(&self, name: &str) -> SlaResult<NamedGrouping> {
        self.entries
            .get(name)
            .map(|grouping| NamedGrouping::new(name, Arc::clone(grouping)))
            .ok_or_else(|| SlaError::UnknownGrouping {
                name: name.to_string(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for Groupings {
    fn default() -> Self {
        let mut groupings = Self::empty();
        groupings.register(GROUP_BY_HOST, PerHost);
        groupings.register(GROUP_NONE, SingleGroup);
        groupings
    }
}

impl fmt::Debug for Groupings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    struct Overlapping;

    impl HostGrouping for Overlapping {
        fn group(&self, hosts: &BTreeSet<String>) -> HostGroups {
            BTreeMap::from([
                ("a".to_string(), hosts.clone()),
                ("b".to_string(), hosts.clone()),
            ])
        }
    }

    struct Dropping;

    impl HostGrouping for Dropping {
        fn group(&self, hosts: &BTreeSet<String>) -> HostGroups {
            hosts
                .iter()
                .skip(1)
                .map(|h| (h.clone(), BTreeSet::from([h.clone()])))
                .collect()
        }
    }

    #[test]
    fn test_by_host_is_identity() {
        let groups = Groupings::default()
            .get(GROUP_BY_HOST)
            .unwrap()
            .partition(&hosts(&["h2", "h1"]))
            .unwrap();
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["h1", "h2"]);
        assert_eq!(groups["h1"], hosts(&["h1"]));
    }

    #[test]
    fn test_none_puts_everything_together() {
        let groups = Groupings::default()
            .get(GROUP_NONE)
            .unwrap()
            .partition(&hosts(&["h1", "h2", "h3"]))
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[ALL_HOSTS_GROUP], hosts(&["h1", "h2", "h3"]));
    }

    #[test]
    fn test_none_on_empty_input() {
        assert!(SingleGroup.group(&BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_key_fn_groups_by_rack() {
        let rack = KeyFn::new(|host: &str| host.split('-').nth(1).unwrap_or(host).to_string());
        let groups = partition("rack", &rack, &hosts(&["h-r1-1", "h-r1-2", "h-r2-1"])).unwrap();
        assert_eq!(groups["r1"], hosts(&["h-r1-1", "h-r1-2"]));
        assert_eq!(groups["r2"], hosts(&["h-r2-1"]));
    }

    #[test]
    fn test_unknown_grouping() {
        let err = Groupings::default().get("by_rack").unwrap_err();
        assert!(err.to_string().contains("by_host, none"));
    }

    #[test]
    fn test_registered_grouping_resolves() {
        let mut groupings = Groupings::default();
        groupings.register("by_rack", KeyFn::new(|h: &str| h[..1].to_string()));
        assert_eq!(groupings.names().count(), 3);
        assert_eq!(groupings.get("by_rack").unwrap().name(), "by_rack");
    }

    #[test]
    fn test_partition_rejects_overlap() {
        let err = partition("bad", &Overlapping, &hosts(&["h1"])).unwrap_err();
        assert!(matches!(err, SlaError::InvalidPartition { .. }));
    }

    #[test]
    fn test_partition_rejects_missing_host() {
        let err = partition("bad", &Dropping, &hosts(&["h1", "h2"])).unwrap_err();
        assert!(err.to_string().contains("'h1' is not grouped"));
    }
}
