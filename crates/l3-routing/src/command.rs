//! Serializable manager commands, used to replay control-plane state.

use serde::{Deserialize, Serialize};

use crate::ecmp::EcmpHashFields;
use crate::error::{L3Error, Result};
use crate::host::{HostId, HostRequest};
use crate::registry::VrfRegistry;
use crate::route::{RouteAction, RouteRequest};

fn default_vrf() -> String {
    "vrf_default".to_string()
}

/// One control-plane call addressed to a VRF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum L3Command {
    AddHost {
        #[serde(default = "default_vrf")]
        vrf: String,
        #[serde(flatten)]
        host: HostRequest,
    },
    DeleteHost {
        #[serde(default = "default_vrf")]
        vrf: String,
        host_id: HostId,
    },
    Route {
        #[serde(default = "default_vrf")]
        vrf: String,
        action: RouteAction,
        #[serde(flatten)]
        route: RouteRequest,
    },
    EcmpHash {
        #[serde(default = "default_vrf")]
        vrf: String,
        fields: EcmpHashFields,
        enable: bool,
    },
}

/// What a successfully applied command produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutput {
    HostAdded(HostId),
    Done,
}

impl L3Command {
    pub fn vrf(&self) -> &str {
        match self {
            L3Command::AddHost { vrf, .. }
            | L3Command::DeleteHost { vrf, .. }
            | L3Command::Route { vrf, .. }
            | L3Command::EcmpHash { vrf, .. } => vrf,
        }
    }

    /// Applies the command to the manager of its VRF.
    pub fn apply(&self, registry: &VrfRegistry) -> Result<CommandOutput> {
        let manager = registry
            .lookup(self.vrf())
            .ok_or_else(|| L3Error::NotFound(format!("VRF {}", self.vrf())))?;

        match self {
            L3Command::AddHost { host, .. } => manager.add_host(host).map(CommandOutput::HostAdded),
            L3Command::DeleteHost { host_id, .. } => {
                manager.delete_host(*host_id).map(|()| CommandOutput::Done)
            }
            L3Command::Route { action, route, .. } => {
                let mut route = route.clone();
                manager
                    .route_action(*action, &mut route)
                    .map(|()| CommandOutput::Done)
            }
            L3Command::EcmpHash { fields, enable, .. } => manager
                .ecmp_hash_set(*fields, *enable)
                .map(|()| CommandOutput::Done),
        }
    }
}
