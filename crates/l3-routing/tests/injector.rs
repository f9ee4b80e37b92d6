//! Route injector runs against a simulated backend.

mod common;

use common::{setup, setup_with};
use l3_hw::{HwStatus, SimOp};
use l3_routing::{InjectorMode, InjectorSource, L3Error, L3ManagerConfig};
use pretty_assertions::assert_eq;
use std::io::Write;

fn start_prefix() -> InjectorSource {
    InjectorSource::Prefix("20.0.0.0/24".parse().unwrap())
}

#[test]
fn test_populate_then_delete() {
    let (hw, mgr) = setup();
    let injector = mgr.injector();

    let run = injector.start_add(&start_prefix(), 300, false).unwrap();
    assert_eq!(run.len(), 300);
    let stats = run.run();

    assert!(!stats.running);
    assert_eq!(stats.mode, InjectorMode::Populating);
    assert_eq!((stats.updated, stats.active, stats.errors), (300, 300, 0));
    assert_eq!(mgr.counts().routes, 300);
    assert!(mgr.route("20.0.0.0/24").is_some());
    assert!(mgr.route("20.1.43.0/24").is_some());
    assert!(mgr.route("20.1.44.0/24").is_none());

    // Every injected route shares the single port next-hop group.
    assert_eq!(mgr.counts().groups, 1);
    assert_eq!(mgr.group(100).unwrap().ref_count, 300);
    assert_eq!(hw.calls(SimOp::NhGroupCreate), 1);

    let stats = injector.start_delete(&start_prefix(), 300).unwrap().run();
    assert_eq!(stats.mode, InjectorMode::Deleting);
    assert_eq!((stats.updated, stats.active, stats.errors), (300, 0, 0));
    assert_eq!(mgr.counts().routes, 0);
    assert_eq!(hw.group_count(), 0);
}

#[test]
fn test_delete_of_missing_routes_is_skipped() {
    let (_hw, mgr) = setup();
    let injector = mgr.injector();
    injector.start_add(&start_prefix(), 2, false).unwrap().run();

    let stats = injector.start_delete(&start_prefix(), 5).unwrap().run();
    assert_eq!((stats.updated, stats.active, stats.errors), (2, 0, 3));
}

#[test]
fn test_failure_stops_run_unless_ignored() {
    let (hw, mgr) = setup();
    let injector = mgr.injector();

    hw.inject_fault_after(SimOp::RouteAdd, 2, HwStatus::Failure);
    let stats = injector.start_add(&start_prefix(), 5, false).unwrap().run();
    assert_eq!((stats.updated, stats.active, stats.errors), (2, 2, 0));
    assert_eq!(mgr.counts().routes, 2);

    let next = InjectorSource::Prefix("30.0.0.0/24".parse().unwrap());
    hw.inject_fault_after(SimOp::RouteAdd, 1, HwStatus::Failure);
    let stats = injector.start_add(&next, 5, true).unwrap().run();
    assert_eq!((stats.updated, stats.active, stats.errors), (4, 6, 1));
    assert_eq!(mgr.counts().routes, 6);
    assert!(mgr.route("30.0.1.0/24").is_none());
}

#[test]
fn test_single_run_at_a_time() {
    let (_hw, mgr) = setup();
    let injector = mgr.injector();

    let first = injector.start_add(&start_prefix(), 10, false).unwrap();
    assert!(injector.stats().running);
    assert!(matches!(
        injector.start_add(&start_prefix(), 10, false),
        Err(L3Error::Busy(_))
    ));

    drop(first);
    assert!(!injector.stats().running);
    let stats = injector.start_add(&start_prefix(), 10, false).unwrap().run();
    assert_eq!(stats.updated, 10);
}

#[test]
fn test_stop_before_first_route() {
    let (_hw, mgr) = setup();
    let injector = mgr.injector();

    let run = injector.start_add(&start_prefix(), 100, false).unwrap();
    injector.stop();
    let stats = run.run();
    assert_eq!((stats.updated, stats.active), (0, 0));
    assert_eq!(mgr.counts().routes, 0);

    // A new run clears the stop request.
    let stats = injector.start_add(&start_prefix(), 3, false).unwrap().run();
    assert_eq!(stats.updated, 3);
}

#[test]
fn test_destroy_stops_injector() {
    let (hw, mgr) = setup();
    mgr.injector().start_add(&start_prefix(), 50, false).unwrap().run();

    mgr.destroy();
    assert_eq!(mgr.counts().routes, 0);
    assert_eq!(hw.route_count(), 0);
    assert_eq!(hw.group_count(), 0);
    assert!(!mgr.injector().stats().running);
}

#[test]
fn test_route_file_source() {
    let (_hw, mgr) = setup();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "4").unwrap();
    writeln!(file, "24 0a000000").unwrap();
    writeln!(file, "24 0x0a000100").unwrap();
    writeln!(file, "16 0b000000").unwrap();
    writeln!(file, "32 0c000001").unwrap();
    file.flush().unwrap();

    let source = InjectorSource::File(file.path().to_path_buf());
    let stats = mgr.injector().start_add(&source, 3, false).unwrap().run();

    assert_eq!(stats.updated, 3);
    for prefix in ["10.0.0.0/24", "10.0.1.0/24", "11.0.0.0/16"] {
        assert!(mgr.route(prefix).is_some(), "{} missing", prefix);
    }
    assert!(mgr.route("12.0.0.1/32").is_none());
}

#[test]
fn test_missing_route_file() {
    let (_hw, mgr) = setup();
    let dir = tempfile::tempdir().unwrap();
    let source = InjectorSource::File(dir.path().join("routes.txt"));

    let err = mgr.injector().start_add(&source, 3, false).unwrap_err();
    assert!(matches!(err, L3Error::InvalidArgument(_)));
    assert!(!mgr.injector().stats().running);
}

#[test]
fn test_disabled_injector() {
    let (_hw, mgr) = setup_with(L3ManagerConfig {
        selftest_enabled: false,
        ..L3ManagerConfig::default()
    });
    let err = mgr.injector().start_add(&start_prefix(), 1, false).unwrap_err();
    assert!(matches!(err, L3Error::Unsupported(_)));
    assert_eq!(err.errno(), 14);
}
