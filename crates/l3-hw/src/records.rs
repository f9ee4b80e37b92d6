//! Hardware records exchanged with the forwarding driver.

use l3_types::{IpAddress, IpPrefix, MacAddress};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an entry in a hardware table (host table slot, route index).
pub type HwIndex = u32;

/// Base id of a contiguous next-hop range owned by one ECMP group.
pub type NhGroupId = u32;

/// Port, LAG or L3 interface id as understood by the driver.
pub type InterfaceId = u32;

/// What the forwarding engine does with a packet hitting an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketCommand {
    #[default]
    Drop,
    Fwd,
    Trap,
    FwdMirror,
}

impl fmt::Display for PacketCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PacketCommand::Drop => "drop",
            PacketCommand::Fwd => "fwd",
            PacketCommand::Trap => "trap",
            PacketCommand::FwdMirror => "mirror",
        };
        f.write_str(s)
    }
}

/// Forwarding data of one next-hop slot (or of a host entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NextHopRecord {
    pub mac: MacAddress,
    pub egress_if: InterfaceId,
    pub l3_intf: InterfaceId,
    /// VLAN service instance, 0 when the interface is not VLAN-bound.
    pub vlan: u16,
    pub pkt_cmd: PacketCommand,
    pub propagate_ttl: bool,
}

/// A host (ARP/ND) entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub vrf_id: u32,
    pub address: IpAddress,
    /// Local addresses are programmed as control entries that trap to the CPU.
    pub local: bool,
    pub next_hop: NextHopRecord,
}

/// Where the driver placed a new host entry.
///
/// When `settled != rehash`, the entry that previously lived at `settled`
/// has been moved to `rehash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPlacement {
    pub settled: HwIndex,
    pub rehash: HwIndex,
}

impl HostPlacement {
    pub const fn at(index: HwIndex) -> Self {
        Self {
            settled: index,
            rehash: index,
        }
    }

    pub const fn relocated(&self) -> bool {
        self.settled != self.rehash
    }
}

/// A route entry pointing at a next-hop group range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub vrf_id: u32,
    pub prefix: IpPrefix,
    /// First next-hop id of the group, 0 for a route without next-hops.
    pub nh_id: NhGroupId,
    pub ecmp_size: u32,
}

impl RouteRecord {
    pub fn mask_len(&self) -> u8 {
        self.prefix.prefix_len()
    }
}

/// Packet header fields the ECMP hash may include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashField {
    STagTpid,
    STagVid,
    UdpSourcePort,
    TcpSourcePort,
    UdpDestinationPort,
    TcpDestinationPort,
    Ipv4SourceIp,
    Ipv4DestinationIp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_packet_command_display() {
        assert_eq!(PacketCommand::Fwd.to_string(), "fwd");
        assert_eq!(PacketCommand::Trap.to_string(), "trap");
        assert_eq!(PacketCommand::default(), PacketCommand::Drop);
    }

    #[test]
    fn test_placement() {
        assert!(!HostPlacement::at(4).relocated());
        let moved = HostPlacement {
            settled: 4,
            rehash: 9,
        };
        assert!(moved.relocated());
    }
}
