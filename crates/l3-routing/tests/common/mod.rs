//! Shared setup for the integration tests.

#![allow(dead_code)]

use l3_hw::SimBackend;
use l3_routing::{
    HostId, HostRequest, L3Manager, L3ManagerConfig, NextHopSpec, RouteAction, RouteRequest,
};
use l3_types::AddressFamily;
use std::sync::Arc;

pub fn setup() -> (Arc<SimBackend>, Arc<L3Manager>) {
    setup_with(L3ManagerConfig::default())
}

pub fn setup_with(config: L3ManagerConfig) -> (Arc<SimBackend>, Arc<L3Manager>) {
    let hw = Arc::new(SimBackend::default());
    let mgr = L3Manager::create(hw.clone(), config);
    (hw, mgr)
}

pub fn remote_host(mgr: &L3Manager, addr: &str, mac: &str, egress_if: u32) -> HostId {
    mgr.add_host(&HostRequest::remote(AddressFamily::Ipv4, addr, mac).with_egress_if(egress_if))
        .unwrap()
}

/// Route through resolved next-hops named after their host ids.
pub fn resolved_route(prefix: &str, hosts: &[HostId]) -> RouteRequest {
    hosts.iter().fold(
        RouteRequest::new(AddressFamily::Ipv4, prefix),
        |req, &host| req.with_nexthop(NextHopSpec::resolved(format!("nh{}", host), host)),
    )
}

/// Route through unresolved gateways with the given ids.
pub fn unresolved_route(prefix: &str, ids: &[&str]) -> RouteRequest {
    ids.iter().fold(
        RouteRequest::new(AddressFamily::Ipv4, prefix),
        |req, id| req.with_nexthop(NextHopSpec::unresolved(*id)),
    )
}

pub fn add(mgr: &L3Manager, mut req: RouteRequest) -> l3_routing::Result<()> {
    mgr.route_action(RouteAction::Add, &mut req)
}

pub fn delete(mgr: &L3Manager, prefix: &str) -> l3_routing::Result<()> {
    let mut req = unresolved_route(prefix, &["any"]);
    mgr.route_action(RouteAction::Delete, &mut req)
}
