//! Host request and entry types.

use l3_hw::{HostRecord, HwIndex, InterfaceId, NextHopRecord, PacketCommand};
use l3_types::{AddressFamily, IpAddress, MacAddress, VlanId};
use serde::{Deserialize, Serialize};

use crate::error::{L3Error, Result};

/// Stable host id handed back to the control plane (the "L3 egress id").
///
/// Ids of deleted hosts are reused, so live ids stay bounded by the number
/// of concurrently live hosts.
pub type HostId = u32;

/// A request to add a host entry, as issued by the neighbor control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRequest {
    #[serde(default)]
    pub family: AddressFamily,
    pub address: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub egress_if: InterfaceId,
    #[serde(default)]
    pub l3_intf: InterfaceId,
    #[serde(default)]
    pub vlan: Option<VlanId>,
    #[serde(default)]
    pub local: bool,
}

impl HostRequest {
    /// A remote (forwarding) host reached through `egress_if`.
    pub fn remote(family: AddressFamily, address: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            family,
            address: address.into(),
            mac: Some(mac.into()),
            egress_if: 0,
            l3_intf: 0,
            vlan: None,
            local: false,
        }
    }

    /// A local address of the switch itself; hits are trapped to the CPU.
    pub fn local(family: AddressFamily, address: impl Into<String>) -> Self {
        Self {
            family,
            address: address.into(),
            mac: None,
            egress_if: 0,
            l3_intf: 0,
            vlan: None,
            local: true,
        }
    }

    pub fn with_egress_if(mut self, egress_if: InterfaceId) -> Self {
        self.egress_if = egress_if;
        self
    }

    pub fn with_l3_intf(mut self, l3_intf: InterfaceId) -> Self {
        self.l3_intf = l3_intf;
        self
    }

    pub fn with_vlan(mut self, vlan: VlanId) -> Self {
        self.vlan = Some(vlan);
        self
    }

    /// Validates the request and builds the hardware record.
    pub(crate) fn to_record(&self, vrf_id: u32) -> Result<HostRecord> {
        let address = IpAddress::parse_for(self.family, &self.address)?;

        let next_hop = if self.local {
            NextHopRecord {
                pkt_cmd: PacketCommand::Trap,
                ..NextHopRecord::default()
            }
        } else {
            let mac = match self.mac.as_deref() {
                Some(mac) => mac
                    .parse::<MacAddress>()
                    .map_err(|e| L3Error::InvalidAddress(e.to_string()))?,
                None => MacAddress::ZERO,
            };
            NextHopRecord {
                mac,
                egress_if: self.egress_if,
                l3_intf: self.l3_intf,
                vlan: VlanId::service_instance(self.vlan),
                pkt_cmd: PacketCommand::Fwd,
                propagate_ttl: false,
            }
        };

        Ok(HostRecord {
            vrf_id,
            address,
            local: self.local,
            next_hop,
        })
    }
}

/// A host entry owned by the host table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostEntry {
    pub id: HostId,
    /// Current hardware index; changes when the backend rehashes the entry.
    pub hw_index: HwIndex,
    pub record: HostRecord,
}

impl HostEntry {
    pub fn address(&self) -> &IpAddress {
        &self.record.address
    }

    pub fn family(&self) -> AddressFamily {
        self.record.address.family()
    }

    pub fn is_local(&self) -> bool {
        self.record.local
    }

    /// Forwarding data copied into next-hops that resolve to this host.
    pub fn next_hop(&self) -> &NextHopRecord {
        &self.record.next_hop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_remote_record() {
        let req = HostRequest::remote(AddressFamily::Ipv4, "10.0.0.1", "aa:bb:cc:dd:ee:01")
            .with_egress_if(1)
            .with_l3_intf(7)
            .with_vlan(VlanId::new(10).unwrap());
        let record = req.to_record(3).unwrap();
        assert_eq!(record.vrf_id, 3);
        assert!(!record.local);
        assert_eq!(record.next_hop.mac.to_string(), "aa:bb:cc:dd:ee:01");
        assert_eq!(record.next_hop.egress_if, 1);
        assert_eq!(record.next_hop.l3_intf, 7);
        assert_eq!(record.next_hop.vlan, 10);
        assert_eq!(record.next_hop.pkt_cmd, PacketCommand::Fwd);
    }

    #[test]
    fn test_local_record_traps() {
        let record = HostRequest::local(AddressFamily::Ipv6, "2001:db8::1")
            .to_record(0)
            .unwrap();
        assert!(record.local);
        assert_eq!(record.next_hop.pkt_cmd, PacketCommand::Trap);
        assert!(record.next_hop.mac.is_zero());
    }

    #[test]
    fn test_invalid_inputs() {
        let wrong_family = HostRequest::remote(AddressFamily::Ipv6, "10.0.0.1", "aa:bb:cc:dd:ee:01");
        assert!(matches!(wrong_family.to_record(0), Err(L3Error::InvalidAddress(_))));

        let bad_mac = HostRequest::remote(AddressFamily::Ipv4, "10.0.0.1", "aa:bb");
        assert!(matches!(bad_mac.to_record(0), Err(L3Error::InvalidAddress(_))));

        let mut no_mac = HostRequest::remote(AddressFamily::Ipv4, "10.0.0.1", "");
        no_mac.mac = None;
        assert!(no_mac.to_record(0).unwrap().next_hop.mac.is_zero());
    }
}
