//! Route request and entry types.

use l3_hw::{HwIndex, NhGroupId, RouteRecord};
use l3_types::{AddressFamily, IpPrefix};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{L3Error, Result};
use crate::nexthop::NextHopSpec;
use crate::nhg::GroupHandle;

/// Route operation requested by the forwarding control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAction {
    /// Install a route, or update the next-hops of an existing one.
    Add,
    Delete,
    /// Remove the named next-hops from an existing route.
    DeleteNexthop,
}

impl fmt::Display for RouteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteAction::Add => write!(f, "ADD"),
            RouteAction::Delete => write!(f, "DELETE"),
            RouteAction::DeleteNexthop => write!(f, "DELETE_NEXTHOP"),
        }
    }
}

/// A route request: family-qualified prefix text plus its next-hops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRequest {
    #[serde(default)]
    pub family: AddressFamily,
    pub prefix: String,
    #[serde(default)]
    pub nexthops: Vec<NextHopSpec>,
}

impl RouteRequest {
    pub fn new(family: AddressFamily, prefix: impl Into<String>) -> Self {
        Self {
            family,
            prefix: prefix.into(),
            nexthops: Vec::new(),
        }
    }

    pub fn with_nexthop(mut self, nexthop: NextHopSpec) -> Self {
        self.nexthops.push(nexthop);
        self
    }

    pub(crate) fn parse_prefix(&self) -> Result<IpPrefix> {
        Ok(IpPrefix::parse_for(self.family, &self.prefix)?)
    }

    /// Next-hops with duplicate ids dropped, first occurrence kept.
    pub(crate) fn distinct_nexthops(&self) -> Vec<&NextHopSpec> {
        let mut seen: Vec<&NextHopSpec> = Vec::with_capacity(self.nexthops.len());
        for nh in &self.nexthops {
            if !seen.iter().any(|s| s.id == nh.id) {
                seen.push(nh);
            }
        }
        seen
    }

    pub(crate) fn require_nexthops(&self) -> Result<()> {
        if self.nexthops.is_empty() {
            return Err(L3Error::InvalidArgument(format!(
                "route {} has no next-hops",
                self.prefix
            )));
        }
        Ok(())
    }
}

/// A route owned by the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub prefix: IpPrefix,
    pub vrf_id: u32,
    /// The group this route holds one reference to; `None` after every
    /// next-hop was removed.
    pub group: Option<GroupHandle>,
    pub hw_index: HwIndex,
}

impl RouteEntry {
    /// Hardware record pointing this route at `group_id`/`size`.
    pub fn record(&self, group_id: NhGroupId, ecmp_size: u32) -> RouteRecord {
        route_record(self.vrf_id, self.prefix, group_id, ecmp_size)
    }
}

pub(crate) fn route_record(
    vrf_id: u32,
    prefix: IpPrefix,
    nh_id: NhGroupId,
    ecmp_size: u32,
) -> RouteRecord {
    RouteRecord {
        vrf_id,
        prefix,
        nh_id,
        ecmp_size,
    }
}
