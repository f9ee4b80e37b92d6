//! Read-only copies of manager state handed out to callers.

use chrono::{DateTime, Utc};
use l3_hw::{HwIndex, InterfaceId, NhGroupId, PacketCommand};
use l3_types::{IpPrefix, MacAddress};
use serde::Serialize;

use crate::ecmp::EcmpHashFields;
use crate::host::HostEntry;
use crate::nexthop::NextHop;
use crate::nhg::NextHopGroup;

/// One programmed next-hop slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextHopView {
    pub id: String,
    pub slot: u32,
    pub nh_port: bool,
    pub mac: MacAddress,
    pub l3_intf: InterfaceId,
    pub egress_if: InterfaceId,
    pub vlan: u16,
    pub action: PacketCommand,
}

impl NextHopView {
    fn new(slot: usize, nh: &NextHop) -> Self {
        let record = nh.record();
        Self {
            id: nh.id().to_string(),
            slot: slot as u32,
            nh_port: nh.is_port(),
            mac: record.mac,
            l3_intf: record.l3_intf,
            egress_if: record.egress_if,
            vlan: record.vlan,
            action: record.pkt_cmd,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub group_id: NhGroupId,
    pub size: u32,
    pub ref_count: u32,
    pub nexthops: Vec<NextHopView>,
}

impl From<&NextHopGroup> for GroupView {
    fn from(group: &NextHopGroup) -> Self {
        Self {
            group_id: group.group_id(),
            size: group.size(),
            ref_count: group.ref_count(),
            nexthops: group
                .members()
                .iter()
                .enumerate()
                .map(|(slot, nh)| NextHopView::new(slot, nh))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteView {
    pub prefix: IpPrefix,
    pub vrf_id: u32,
    pub hw_index: HwIndex,
    /// `None` once every next-hop was removed.
    pub group: Option<GroupView>,
}

impl RouteView {
    pub fn group_id(&self) -> Option<NhGroupId> {
        self.group.as_ref().map(|g| g.group_id)
    }

    pub fn nexthop_ids(&self) -> Vec<&str> {
        self.group
            .iter()
            .flat_map(|g| g.nexthops.iter().map(|nh| nh.id.as_str()))
            .collect()
    }
}

/// Table sizes of one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct L3Counts {
    pub hosts: usize,
    pub routes: usize,
    pub groups: usize,
}

/// Full copy of one manager's tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct L3Snapshot {
    pub taken_at: DateTime<Utc>,
    pub vrf_name: String,
    pub vrf_id: u32,
    pub ecmp_hash: EcmpHashFields,
    pub hosts: Vec<HostEntry>,
    pub routes: Vec<RouteView>,
    pub groups: Vec<GroupView>,
}
