//! Next-hop requests and the next-hop entries stored in a group.
//!
//! A next-hop is identified by an opaque id chosen by the routing control
//! plane. Its forwarding data is either copied from a resolved host entry or
//! left as a trap-to-CPU marker until the neighbor resolves.

use l3_hw::{NextHopRecord, PacketCommand};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{L3Error, Result};
use crate::host::{HostId, HostTable};

/// How a next-hop is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextHopKind {
    /// The next-hop is an egress port; its id names the port.
    Port,
    /// The next-hop is an IP gateway resolved through a host entry.
    #[default]
    ResolvedHost,
}

/// Neighbor resolution state reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextHopState {
    Resolved,
    #[default]
    Unresolved,
}

/// Error reported back on a next-hop of a failed route request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopError {
    pub code: i32,
    pub message: String,
}

/// One next-hop of a route request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopSpec {
    pub id: String,
    #[serde(default)]
    pub kind: NextHopKind,
    #[serde(default)]
    pub state: NextHopState,
    /// Host entry supplying the forwarding data once resolved.
    #[serde(default)]
    pub host_id: Option<HostId>,
    /// Filled in when an `Add` carrying this next-hop fails.
    #[serde(default, skip_deserializing)]
    pub error: Option<NextHopError>,
}

impl NextHopSpec {
    /// A next-hop resolved through host `host_id`.
    pub fn resolved(id: impl Into<String>, host_id: HostId) -> Self {
        Self {
            id: id.into(),
            kind: NextHopKind::ResolvedHost,
            state: NextHopState::Resolved,
            host_id: Some(host_id),
            error: None,
        }
    }

    /// A gateway whose neighbor is not resolved yet.
    pub fn unresolved(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NextHopKind::ResolvedHost,
            state: NextHopState::Unresolved,
            host_id: None,
            error: None,
        }
    }

    /// A port next-hop.
    pub fn port(id: impl Into<String>, state: NextHopState) -> Self {
        Self {
            id: id.into(),
            kind: NextHopKind::Port,
            state,
            host_id: None,
            error: None,
        }
    }

    pub fn with_host(mut self, host_id: HostId) -> Self {
        self.host_id = Some(host_id);
        self
    }
}

/// A next-hop stored in a group, occupying one hardware slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHop {
    id: String,
    nh_port: bool,
    record: NextHopRecord,
}

impl NextHop {
    /// Builds a next-hop for `spec`, resolving it against `hosts`.
    pub fn create(hosts: &HostTable, spec: &NextHopSpec) -> Result<Self> {
        let record = resolve(hosts, &NextHopRecord::default(), spec)?;
        Ok(Self {
            id: spec.id.clone(),
            nh_port: spec.kind == NextHopKind::Port,
            record,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_port(&self) -> bool {
        self.nh_port
    }

    pub fn record(&self) -> &NextHopRecord {
        &self.record
    }

    /// Computes the record this next-hop would have after applying `spec`,
    /// without changing it.
    pub fn updated_record(&self, hosts: &HostTable, spec: &NextHopSpec) -> Result<NextHopRecord> {
        resolve(hosts, &self.record, spec)
    }

    pub fn set_record(&mut self, record: NextHopRecord) {
        self.record = record;
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.record.pkt_cmd)
    }
}

/// Resolution rule shared by create and update.
///
/// Resolved: copy MAC, egress, L3 interface and VLAN from the host and
/// forward. Unresolved: trap to CPU, unless the slot already forwards.
fn resolve(hosts: &HostTable, current: &NextHopRecord, spec: &NextHopSpec) -> Result<NextHopRecord> {
    let mut record = *current;

    match spec.state {
        NextHopState::Resolved => {
            let host_id = spec.host_id.ok_or_else(|| {
                L3Error::InvalidArgument(format!("resolved next-hop {} has no host id", spec.id))
            })?;
            let host = hosts.get(host_id).ok_or_else(|| {
                L3Error::NotFound(format!("host id {} for next-hop {}", host_id, spec.id))
            })?;
            let data = host.next_hop();
            record.mac = data.mac;
            record.egress_if = data.egress_if;
            record.l3_intf = data.l3_intf;
            record.vlan = data.vlan;
            record.pkt_cmd = PacketCommand::Fwd;
        }
        NextHopState::Unresolved => {
            if record.pkt_cmd != PacketCommand::Fwd {
                record.pkt_cmd = PacketCommand::Trap;
            }
        }
    }
    record.propagate_ttl = false;

    Ok(record)
}
