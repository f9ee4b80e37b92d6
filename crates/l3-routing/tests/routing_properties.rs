//! Dedup, refcount and id-recycling behavior of the manager against the
//! simulated backend.

mod common;

use common::{add, delete, remote_host, resolved_route, setup, unresolved_route};
use l3_hw::{HashField, HwStatus, PacketCommand, SimOp};
use l3_routing::{EcmpHashFields, HostRequest, L3Error, NextHopSpec, RouteAction};
use l3_types::{AddressFamily, IpPrefix};
use pretty_assertions::assert_eq;

#[test]
fn test_scenario_shared_group_lifetime() {
    let (hw, mgr) = setup();

    let host = remote_host(&mgr, "10.0.0.1", "aa:bb:cc:dd:ee:01", 1);
    assert_eq!(host, 0);

    add(&mgr, resolved_route("10.0.0.0/24", &[host])).unwrap();
    let first = mgr.route("10.0.0.0/24").unwrap();
    assert_eq!(first.group_id(), Some(100));
    let group = first.group.unwrap();
    assert_eq!(group.size, 1);
    assert_eq!(group.nexthops[0].action, PacketCommand::Fwd);
    assert_eq!(group.nexthops[0].egress_if, 1);
    assert_eq!(group.nexthops[0].mac.to_string(), "aa:bb:cc:dd:ee:01");

    add(&mgr, resolved_route("10.0.1.0/24", &[host])).unwrap();
    assert_eq!(mgr.route("10.0.1.0/24").unwrap().group_id(), Some(100));
    assert_eq!(mgr.group(100).unwrap().ref_count, 2);
    assert_eq!(hw.calls(SimOp::NhGroupCreate), 1);

    delete(&mgr, "10.0.0.0/24").unwrap();
    assert_eq!(mgr.group(100).unwrap().ref_count, 1);
    assert!(hw.group(100).is_some());

    delete(&mgr, "10.0.1.0/24").unwrap();
    assert!(mgr.group(100).is_none());
    assert!(hw.group(100).is_none());
    assert_eq!(hw.route_count(), 0);
}

#[test]
fn test_set_equal_nexthops_share_one_group() {
    let (hw, mgr) = setup();
    let a = remote_host(&mgr, "10.0.0.1", "aa:bb:cc:dd:ee:01", 1);
    let b = remote_host(&mgr, "10.0.0.2", "aa:bb:cc:dd:ee:02", 2);

    add(&mgr, resolved_route("10.1.0.0/16", &[a, b])).unwrap();
    add(&mgr, resolved_route("10.2.0.0/16", &[b, a])).unwrap();
    add(&mgr, resolved_route("10.3.0.0/16", &[a, b, a])).unwrap();

    let group_id = mgr.route("10.1.0.0/16").unwrap().group_id();
    for prefix in ["10.2.0.0/16", "10.3.0.0/16"] {
        assert_eq!(mgr.route(prefix).unwrap().group_id(), group_id);
    }
    assert_eq!(mgr.counts().groups, 1);
    assert_eq!(hw.group_count(), 1);
    assert_eq!(mgr.group(group_id.unwrap()).unwrap().ref_count, 3);

    add(&mgr, resolved_route("10.4.0.0/16", &[a])).unwrap();
    assert_ne!(mgr.route("10.4.0.0/16").unwrap().group_id(), group_id);
    assert_eq!(mgr.counts().groups, 2);
}

#[test]
fn test_idempotent_re_add() {
    let (hw, mgr) = setup();
    let host = remote_host(&mgr, "10.0.0.1", "aa:bb:cc:dd:ee:01", 1);

    add(&mgr, resolved_route("10.0.0.0/24", &[host])).unwrap();
    add(&mgr, resolved_route("10.0.0.0/24", &[host])).unwrap();

    assert_eq!(mgr.counts().routes, 1);
    assert_eq!(mgr.counts().groups, 1);
    assert_eq!(mgr.group(100).unwrap().ref_count, 1);
    assert_eq!(hw.calls(SimOp::RouteAdd), 1);
    assert_eq!(hw.calls(SimOp::RouteUpdate), 0);
    assert_eq!(hw.group_count(), 1);
}

#[test]
fn test_resolution_update_reaches_every_sharing_route() {
    let (hw, mgr) = setup();
    add(&mgr, unresolved_route("10.0.0.0/24", &["gw"])).unwrap();
    add(&mgr, unresolved_route("10.0.1.0/24", &["gw"])).unwrap();
    assert_eq!(
        mgr.group(100).unwrap().nexthops[0].action,
        PacketCommand::Trap
    );

    let host = remote_host(&mgr, "10.9.0.1", "aa:bb:cc:dd:ee:09", 9);
    let mut req = l3_routing::RouteRequest::new(AddressFamily::Ipv4, "10.0.0.0/24")
        .with_nexthop(NextHopSpec::resolved("gw", host));
    mgr.route_action(RouteAction::Add, &mut req).unwrap();

    for prefix in ["10.0.0.0/24", "10.0.1.0/24"] {
        let nh = &mgr.route(prefix).unwrap().group.unwrap().nexthops[0];
        assert_eq!(nh.action, PacketCommand::Fwd);
        assert_eq!(nh.egress_if, 9);
    }
    let slot = hw.group(100).unwrap().slots[0].unwrap();
    assert_eq!(slot.pkt_cmd, PacketCommand::Fwd);
    assert_eq!(hw.calls(SimOp::RouteUpdate), 0);
}

#[test]
fn test_growth_on_shared_group_leaves_other_route_alone() {
    let (_hw, mgr) = setup();
    add(&mgr, unresolved_route("10.0.0.0/24", &["a"])).unwrap();
    add(&mgr, unresolved_route("10.0.1.0/24", &["a"])).unwrap();

    add(&mgr, unresolved_route("10.0.0.0/24", &["b", "c"])).unwrap();

    assert_eq!(mgr.route("10.0.0.0/24").unwrap().nexthop_ids(), vec!["a", "b", "c"]);
    let other = mgr.route("10.0.1.0/24").unwrap();
    assert_eq!(other.nexthop_ids(), vec!["a"]);
    assert_eq!(other.group.unwrap().ref_count, 1);
}

#[test]
fn test_host_ids_bounded_by_live_hosts() {
    let (_hw, mgr) = setup();
    for round in 0..100u32 {
        let ids: Vec<u32> = (0..3)
            .map(|i| {
                let addr = format!("10.{}.0.{}", round, i + 1);
                remote_host(&mgr, &addr, "aa:bb:cc:dd:ee:01", 1)
            })
            .collect();
        assert!(ids.iter().all(|&id| id < 3), "round {}: {:?}", round, ids);
        for id in ids {
            mgr.delete_host(id).unwrap();
        }
    }
    assert_eq!(mgr.counts().hosts, 0);
}

#[test]
fn test_rehash_keeps_both_lookups_consistent() {
    let (hw, mgr) = setup();
    let first = remote_host(&mgr, "10.0.0.1", "aa:bb:cc:dd:ee:01", 1);
    let index = mgr.host(first).unwrap().hw_index;

    hw.script_rehash(index);
    let second = remote_host(&mgr, "10.0.0.2", "aa:bb:cc:dd:ee:02", 2);

    let moved = mgr.host(first).unwrap();
    assert_ne!(moved.hw_index, index);
    assert_eq!(mgr.host_by_hw_index(moved.hw_index).unwrap(), moved);
    assert_eq!(mgr.host_by_hw_index(index).unwrap().id, second);
    assert_eq!(
        hw.host_at(moved.hw_index).unwrap().address.to_string(),
        "10.0.0.1"
    );

    mgr.delete_host(first).unwrap();
    assert!(hw.host_at(moved.hw_index).is_none());
    assert_eq!(hw.host_at(index).unwrap().address.to_string(), "10.0.0.2");
}

#[test]
fn test_unknown_targets_are_not_found_without_side_effects() {
    let (hw, mgr) = setup();
    assert!(matches!(mgr.delete_host(7), Err(L3Error::NotFound(_))));
    assert!(matches!(delete(&mgr, "10.0.0.0/24"), Err(L3Error::NotFound(_))));

    let mut req = unresolved_route("10.0.0.0/24", &["a"]);
    assert!(matches!(
        mgr.route_action(RouteAction::DeleteNexthop, &mut req),
        Err(L3Error::NotFound(_))
    ));
    assert_eq!(hw.calls(SimOp::HostRemove), 0);
    assert_eq!(hw.calls(SimOp::RouteRemove), 0);
    assert_eq!(hw.calls(SimOp::RouteUpdate), 0);
}

#[test]
fn test_invalid_addresses() {
    let (hw, mgr) = setup();
    let bad_host = HostRequest::remote(AddressFamily::Ipv4, "10.0.0.256", "aa:bb:cc:dd:ee:01");
    assert!(matches!(mgr.add_host(&bad_host), Err(L3Error::InvalidAddress(_))));

    let mut req = l3_routing::RouteRequest::new(AddressFamily::Ipv6, "10.0.0.0/24")
        .with_nexthop(NextHopSpec::unresolved("a"));
    let err = mgr.route_action(RouteAction::Add, &mut req).unwrap_err();
    assert!(matches!(err, L3Error::InvalidAddress(_)));
    assert_eq!(req.nexthops[0].error.as_ref().unwrap().code, err.errno());
    assert_eq!(hw.calls(SimOp::HostAdd), 0);
    assert_eq!(hw.calls(SimOp::NhGroupCreate), 0);
}

#[test]
fn test_ipv6_routes_and_hosts() {
    let (hw, mgr) = setup();
    let host = mgr
        .add_host(&HostRequest::remote(AddressFamily::Ipv6, "2001:db8::1", "aa:bb:cc:dd:ee:01"))
        .unwrap();
    let mut req = l3_routing::RouteRequest::new(AddressFamily::Ipv6, "2001:db8:1::/48")
        .with_nexthop(NextHopSpec::resolved("2001:db8::1", host));
    mgr.route_action(RouteAction::Add, &mut req).unwrap();

    let prefix: IpPrefix = "2001:db8:1::/48".parse().unwrap();
    let record = hw.route(0, &prefix).unwrap();
    assert_eq!(record.mask_len(), 48);
    assert_eq!(record.ecmp_size, 1);
}

#[test]
fn test_too_many_nexthops() {
    let (hw, mgr) = setup();
    let ids: Vec<String> = (0..33).map(|i| format!("gw{}", i)).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let err = add(&mgr, unresolved_route("10.0.0.0/24", &refs)).unwrap_err();
    assert!(matches!(err, L3Error::ResourceExhausted(_)));
    assert_eq!(hw.calls(SimOp::NhGroupCreate), 0);

    add(&mgr, unresolved_route("10.0.0.0/24", &refs[..32])).unwrap();
    assert_eq!(mgr.route("10.0.0.0/24").unwrap().group.unwrap().size, 32);
}

#[test]
fn test_ecmp_policy_guard() {
    let (hw, mgr) = setup();
    assert_eq!(mgr.ecmp_hash(), EcmpHashFields::ALL);

    for fields in [
        EcmpHashFields::SRCPORT,
        EcmpHashFields::DSTPORT,
        EcmpHashFields::SRCIP | EcmpHashFields::DSTIP,
    ] {
        assert!(matches!(
            mgr.ecmp_hash_set(fields, false),
            Err(L3Error::Unsupported(_))
        ));
        assert_eq!(mgr.ecmp_hash(), EcmpHashFields::ALL);
    }
    assert_eq!(hw.calls(SimOp::HashFieldsSet), 0);

    mgr.ecmp_hash_set(EcmpHashFields::DSTIP, false).unwrap();
    assert!(!hw.hash_fields().contains(&HashField::Ipv4DestinationIp));
    assert!(matches!(
        mgr.ecmp_hash_set(EcmpHashFields::SRCIP, false),
        Err(L3Error::Unsupported(_))
    ));
    assert_eq!(
        mgr.ecmp_hash(),
        EcmpHashFields::SRCPORT | EcmpHashFields::DSTPORT | EcmpHashFields::SRCIP
    );

    mgr.ecmp_hash_set(EcmpHashFields::DSTIP, true).unwrap();
    assert_eq!(mgr.ecmp_hash(), EcmpHashFields::ALL);
    assert_eq!(hw.hash_fields().len(), 8);
}

#[test]
fn test_ecmp_mask_unchanged_when_hardware_rejects() {
    let (hw, mgr) = setup();
    hw.inject_fault(SimOp::HashFieldsSet, HwStatus::Failure);

    let err = mgr.ecmp_hash_set(EcmpHashFields::DSTIP, false).unwrap_err();
    assert!(matches!(err, L3Error::HardwareRejected { op: "hash_fields_set", .. }));
    assert_eq!(mgr.ecmp_hash(), EcmpHashFields::ALL);
    assert!(hw.hash_fields().is_empty());

    mgr.ecmp_hash_set(EcmpHashFields::DSTIP, false).unwrap();
    assert_eq!(
        mgr.ecmp_hash(),
        EcmpHashFields::SRCPORT | EcmpHashFields::DSTPORT | EcmpHashFields::SRCIP
    );
}
