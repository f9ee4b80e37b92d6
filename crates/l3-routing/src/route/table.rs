//! Route table keyed by prefix.

use l3_types::IpPrefix;
use std::collections::BTreeMap;

use super::types::RouteEntry;

/// Installed routes of one VRF, in prefix order.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: BTreeMap<IpPrefix, RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn contains(&self, prefix: &IpPrefix) -> bool {
        self.routes.contains_key(prefix)
    }

    pub fn get(&self, prefix: &IpPrefix) -> Option<&RouteEntry> {
        self.routes.get(prefix)
    }

    pub(crate) fn get_mut(&mut self, prefix: &IpPrefix) -> Option<&mut RouteEntry> {
        self.routes.get_mut(prefix)
    }

    pub(crate) fn insert(&mut self, entry: RouteEntry) -> Option<RouteEntry> {
        self.routes.insert(entry.prefix, entry)
    }

    pub(crate) fn remove(&mut self, prefix: &IpPrefix) -> Option<RouteEntry> {
        self.routes.remove(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.values()
    }

    /// Removes and returns every route.
    pub(crate) fn take_all(&mut self) -> Vec<RouteEntry> {
        std::mem::take(&mut self.routes).into_values().collect()
    }
}
