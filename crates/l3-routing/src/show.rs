//! Text tables for operators.

use std::fmt::Write;

use crate::manager::{L3Manager, NextHopView};
use crate::registry::VrfRegistry;
use crate::selftest::{InjectorMode, InjectorStats};

fn rule(out: &mut String, width: usize) {
    out.push_str(&"=".repeat(width));
    out.push('\n');
}

/// Route, host and group counts of every registered VRF.
pub fn show_summary(registry: &VrfRegistry) -> String {
    let mut out = String::new();
    rule(&mut out, 49);
    out.push_str("VRF            Routes      Hosts       NH Groups \n");
    rule(&mut out, 49);
    for manager in registry.managers() {
        let counts = manager.counts();
        let _ = writeln!(
            out,
            "{:<15}{:<12}{:<12}{:<12}",
            manager.vrf_name(),
            counts.routes,
            counts.hosts,
            counts.groups
        );
    }
    out
}

/// Injector state in the layout of the route test status command.
pub fn show_injector(stats: &InjectorStats) -> String {
    let state = match (stats.running, stats.mode) {
        (false, _) | (true, InjectorMode::Idle) => "not running",
        (true, InjectorMode::Populating) => "populating routes",
        (true, InjectorMode::Deleting) => "deleting routes",
    };
    let updated_label = match stats.mode {
        InjectorMode::Deleting => "Removed routes    ",
        _ => "Populated routes  ",
    };

    let mut out = String::new();
    rule(&mut out, 52);
    let _ = writeln!(out, "Test state        : {}", state);
    let _ = writeln!(out, "{}: {}", updated_label, stats.updated);
    let _ = writeln!(out, "Active routes     : {}", stats.active);
    let _ = writeln!(out, "Skipped routes    : {}", stats.errors);
    let _ = writeln!(
        out,
        "Execution time    : {}.{:06} seconds",
        stats.exec_time.as_secs(),
        stats.exec_time.subsec_micros()
    );
    rule(&mut out, 52);
    out
}

fn nexthop_columns(out: &mut String, nh: &NextHopView) {
    let _ = writeln!(
        out,
        "{:<20}{:<20}{:<15}{:<15}{:<14}{}",
        nh.id,
        nh.mac.to_string(),
        nh.l3_intf,
        nh.egress_if,
        nh.vlan,
        nh.action
    );
}

impl L3Manager {
    pub fn show_routes(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();
        rule(&mut out, 65);
        out.push_str("Network             Gateway          Intf      Action    NH Grp  \n");
        rule(&mut out, 65);
        for route in &snapshot.routes {
            let prefix = route.prefix.to_string();
            let Some(group) = &route.group else {
                let _ = writeln!(out, "{}", prefix);
                continue;
            };
            for (i, nh) in group.nexthops.iter().enumerate() {
                let (gateway, intf) = if nh.nh_port {
                    ("*", nh.id.as_str())
                } else {
                    (nh.id.as_str(), "")
                };
                let _ = writeln!(
                    out,
                    "{:<20}{:<17}{:<10}{:<10}{}",
                    if i == 0 { prefix.as_str() } else { "" },
                    gateway,
                    intf,
                    nh.action.to_string(),
                    group.group_id
                );
            }
        }
        out
    }

    pub fn show_hosts(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();
        rule(&mut out, 92);
        out.push_str(
            "Host                MAC                 L3 intf        Egress intf    Service Id    Action  \n",
        );
        rule(&mut out, 92);
        for host in &snapshot.hosts {
            let nh = host.next_hop();
            let _ = writeln!(
                out,
                "{:<20}{:<20}{:<15}{:<15}{:<14}{}",
                host.address().to_string(),
                nh.mac.to_string(),
                nh.l3_intf,
                nh.egress_if,
                nh.vlan,
                nh.pkt_cmd
            );
        }
        out
    }

    pub fn show_nexthops(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();
        rule(&mut out, 112);
        out.push_str("Group     Ref       NextHop             MAC                 L3 intf        Egress intf    Service Id    Action  \n");
        rule(&mut out, 112);
        for group in &snapshot.groups {
            for (i, nh) in group.nexthops.iter().enumerate() {
                if i == 0 {
                    let _ = write!(out, "{:<10}{:<10}", group.group_id, group.ref_count);
                } else {
                    let _ = write!(out, "{:<20}", "");
                }
                nexthop_columns(&mut out, nh);
            }
        }
        out
    }
}
