//! In-memory forwarding backend.
//!
//! `SimBackend` behaves like a small ASIC: it hands out host table indices,
//! contiguous next-hop ranges starting at a configurable base id, and route
//! indices. Tests can make any primitive fail (immediately or after a number
//! of successful calls) and can script a host-table rehash so the next
//! `host_add` relocates an existing entry.

use crate::backend::L3Backend;
use crate::error::{HwError, HwResult, HwStatus};
use crate::records::{
    HashField, HostPlacement, HostRecord, HwIndex, NextHopRecord, NhGroupId, RouteRecord,
};
use l3_types::{AddressFamily, IpPrefix};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Backend primitives, used to address fault injection and call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimOp {
    HostAdd,
    HostRemove,
    NhGroupCreate,
    NhGroupDestroy,
    NhSet,
    NhClear,
    RouteAdd,
    RouteUpdate,
    RouteRemove,
    HashFieldsSet,
}

impl SimOp {
    pub const fn name(&self) -> &'static str {
        match self {
            SimOp::HostAdd => "host_add",
            SimOp::HostRemove => "host_remove_by_index",
            SimOp::NhGroupCreate => "nh_group_create",
            SimOp::NhGroupDestroy => "nh_group_destroy",
            SimOp::NhSet => "nh_set",
            SimOp::NhClear => "nh_clear",
            SimOp::RouteAdd => "route_add",
            SimOp::RouteUpdate => "route_update",
            SimOp::RouteRemove => "route_remove",
            SimOp::HashFieldsSet => "hash_fields_set",
        }
    }
}

/// Table sizes of the simulated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// First next-hop id handed out to a group.
    pub group_id_base: NhGroupId,
    /// Number of next-hop ids available to groups.
    pub group_id_capacity: u32,
    pub host_capacity: usize,
    pub route_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            group_id_base: 100,
            group_id_capacity: 16 * 1024,
            host_capacity: 64 * 1024,
            route_capacity: 1024 * 1024,
        }
    }
}

/// Snapshot of a simulated next-hop group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimGroup {
    pub size: u32,
    pub slots: Vec<Option<NextHopRecord>>,
}

#[derive(Debug)]
struct Fault {
    op: SimOp,
    skip: usize,
    status: HwStatus,
}

#[derive(Debug, Default)]
struct SimState {
    hosts: BTreeMap<HwIndex, HostRecord>,
    free_host_indices: BTreeSet<HwIndex>,
    next_host_index: HwIndex,
    pending_rehash: VecDeque<HwIndex>,
    groups: BTreeMap<NhGroupId, SimGroup>,
    free_ranges: Vec<(NhGroupId, u32)>,
    next_group_offset: u32,
    routes: HashMap<(u32, IpPrefix), (HwIndex, RouteRecord)>,
    next_route_index: HwIndex,
    hash_fields: Vec<HashField>,
    faults: Vec<Fault>,
    calls: HashMap<SimOp, usize>,
}

impl SimState {
    /// Counts the call and fires a pending fault for `op`, if any.
    fn enter(&mut self, op: SimOp) -> HwResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;

        let Some(pos) = self.faults.iter().position(|f| f.op == op) else {
            return Ok(());
        };
        if self.faults[pos].skip > 0 {
            self.faults[pos].skip -= 1;
            return Ok(());
        }
        let fault = self.faults.remove(pos);
        debug!("SimBackend: injected {} failure: {}", op.name(), fault.status);
        Err(HwError::new(op.name(), fault.status).with_detail("injected"))
    }

    fn alloc_host_index(&mut self) -> HwIndex {
        match self.free_host_indices.pop_first() {
            Some(index) => index,
            None => {
                let index = self.next_host_index;
                self.next_host_index += 1;
                index
            }
        }
    }
}

/// In-memory [`L3Backend`].
#[derive(Debug, Default)]
pub struct SimBackend {
    config: SimConfig,
    state: Mutex<SimState>,
}

impl SimBackend {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SimState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Makes the next call of `op` fail with `status`.
    pub fn inject_fault(&self, op: SimOp, status: HwStatus) {
        self.inject_fault_after(op, 0, status);
    }

    /// Lets `skip` calls of `op` succeed, then fails the following one.
    pub fn inject_fault_after(&self, op: SimOp, skip: usize, status: HwStatus) {
        self.lock().faults.push(Fault { op, skip, status });
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// On the next `host_add`, the new entry settles at `victim` and the entry
    /// currently stored there is moved to a fresh index.
    pub fn script_rehash(&self, victim: HwIndex) {
        self.lock().pending_rehash.push_back(victim);
    }

    /// Number of calls made to `op`, failed ones included.
    pub fn calls(&self, op: SimOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn host_at(&self, index: HwIndex) -> Option<HostRecord> {
        self.lock().hosts.get(&index).cloned()
    }

    pub fn host_count(&self) -> usize {
        self.lock().hosts.len()
    }

    pub fn group(&self, group_id: NhGroupId) -> Option<SimGroup> {
        self.lock().groups.get(&group_id).cloned()
    }

    pub fn group_count(&self) -> usize {
        self.lock().groups.len()
    }

    pub fn route(&self, vrf_id: u32, prefix: &IpPrefix) -> Option<RouteRecord> {
        self.lock()
            .routes
            .get(&(vrf_id, *prefix))
            .map(|(_, record)| record.clone())
    }

    pub fn route_count(&self) -> usize {
        self.lock().routes.len()
    }

    pub fn hash_fields(&self) -> Vec<HashField> {
        self.lock().hash_fields.clone()
    }
}

impl L3Backend for SimBackend {
    fn host_add(&self, record: &HostRecord) -> HwResult<HostPlacement> {
        let mut st = self.lock();
        st.enter(SimOp::HostAdd)?;

        if st.hosts.len() >= self.config.host_capacity {
            return Err(HwError::table_full("host_add", "host table"));
        }

        while let Some(victim) = st.pending_rehash.pop_front() {
            let Some(existing) = st.hosts.remove(&victim) else {
                continue;
            };
            let moved_to = st.alloc_host_index();
            st.hosts.insert(moved_to, existing);
            st.hosts.insert(victim, record.clone());
            debug!(
                "SimBackend: host {} settled at {}, previous entry rehashed to {}",
                record.address, victim, moved_to
            );
            return Ok(HostPlacement {
                settled: victim,
                rehash: moved_to,
            });
        }

        let index = st.alloc_host_index();
        st.hosts.insert(index, record.clone());
        Ok(HostPlacement::at(index))
    }

    fn host_remove_by_index(&self, index: HwIndex, family: AddressFamily) -> HwResult<()> {
        let mut st = self.lock();
        st.enter(SimOp::HostRemove)?;

        match st.hosts.get(&index) {
            Some(host) if host.address.family() == family => {}
            Some(_) => {
                return Err(HwError::invalid_parameter(
                    "host_remove_by_index",
                    format!("index {} is not an {} entry", index, family),
                ))
            }
            None => return Err(HwError::not_found("host_remove_by_index", index.to_string())),
        }
        st.hosts.remove(&index);
        st.free_host_indices.insert(index);
        Ok(())
    }

    fn nh_group_create(&self, size: u32) -> HwResult<NhGroupId> {
        let mut st = self.lock();
        st.enter(SimOp::NhGroupCreate)?;

        if size == 0 {
            return Err(HwError::invalid_parameter("nh_group_create", "size 0"));
        }

        let group_id = match st.free_ranges.iter().position(|(_, s)| *s == size) {
            Some(pos) => st.free_ranges.swap_remove(pos).0,
            None => {
                if st.next_group_offset.saturating_add(size) > self.config.group_id_capacity {
                    return Err(HwError::table_full("nh_group_create", "next-hop ids"));
                }
                let id = self.config.group_id_base + st.next_group_offset;
                st.next_group_offset += size;
                id
            }
        };

        st.groups.insert(
            group_id,
            SimGroup {
                size,
                slots: vec![None; size as usize],
            },
        );
        Ok(group_id)
    }

    fn nh_group_destroy(&self, group_id: NhGroupId, size: u32) -> HwResult<()> {
        let mut st = self.lock();
        st.enter(SimOp::NhGroupDestroy)?;

        match st.groups.get(&group_id) {
            Some(group) if group.size == size => {}
            Some(group) => {
                return Err(HwError::invalid_parameter(
                    "nh_group_destroy",
                    format!("group {} has size {}, not {}", group_id, group.size, size),
                ))
            }
            None => return Err(HwError::not_found("nh_group_destroy", group_id.to_string())),
        }
        st.groups.remove(&group_id);
        st.free_ranges.push((group_id, size));
        Ok(())
    }

    fn nh_set(&self, group_id: NhGroupId, slot: u32, record: &NextHopRecord) -> HwResult<()> {
        let mut st = self.lock();
        st.enter(SimOp::NhSet)?;

        let group = st
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| HwError::not_found("nh_set", group_id.to_string()))?;
        let entry = group
            .slots
            .get_mut(slot as usize)
            .ok_or_else(|| HwError::new("nh_set", HwStatus::InvalidIndex))?;
        *entry = Some(*record);
        Ok(())
    }

    fn nh_clear(&self, group_id: NhGroupId, slot: u32) -> HwResult<()> {
        let mut st = self.lock();
        st.enter(SimOp::NhClear)?;

        let group = st
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| HwError::not_found("nh_clear", group_id.to_string()))?;
        let entry = group
            .slots
            .get_mut(slot as usize)
            .ok_or_else(|| HwError::new("nh_clear", HwStatus::InvalidIndex))?;
        *entry = None;
        Ok(())
    }

    fn route_add(&self, record: &RouteRecord) -> HwResult<HwIndex> {
        let mut st = self.lock();
        st.enter(SimOp::RouteAdd)?;

        let key = (record.vrf_id, record.prefix);
        if st.routes.contains_key(&key) {
            return Err(HwError::new("route_add", HwStatus::ItemAlreadyExists)
                .with_detail(record.prefix.to_string()));
        }
        if st.routes.len() >= self.config.route_capacity {
            return Err(HwError::table_full("route_add", "route table"));
        }
        let index = st.next_route_index;
        st.next_route_index += 1;
        st.routes.insert(key, (index, record.clone()));
        Ok(index)
    }

    fn route_update(&self, record: &RouteRecord) -> HwResult<()> {
        let mut st = self.lock();
        st.enter(SimOp::RouteUpdate)?;

        let entry = st
            .routes
            .get_mut(&(record.vrf_id, record.prefix))
            .ok_or_else(|| HwError::not_found("route_update", record.prefix.to_string()))?;
        entry.1 = record.clone();
        Ok(())
    }

    fn route_remove(&self, record: &RouteRecord) -> HwResult<()> {
        let mut st = self.lock();
        st.enter(SimOp::RouteRemove)?;

        st.routes
            .remove(&(record.vrf_id, record.prefix))
            .map(|_| ())
            .ok_or_else(|| HwError::not_found("route_remove", record.prefix.to_string()))
    }

    fn hash_fields_set(&self, fields: &[HashField]) -> HwResult<()> {
        let mut st = self.lock();
        st.enter(SimOp::HashFieldsSet)?;

        st.hash_fields = fields.to_vec();
        Ok(())
    }
}
