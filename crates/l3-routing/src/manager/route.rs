//! Route add, update and delete sequencing across the three tables.

use l3_hw::{L3Backend, NextHopRecord, NhGroupId};
use l3_types::IpPrefix;
use log::{debug, error, warn};

use super::L3State;
use crate::error::{L3Error, Result};
use crate::nexthop::{NextHop, NextHopSpec};
use crate::nhg::{GroupHandle, NextHopGroup};
use crate::route::{route_record, RouteEntry, RouteRequest};

impl L3State {
    /// Installs a new route or updates the next-hops of an existing one.
    pub(crate) fn route_add(
        &mut self,
        backend: &dyn L3Backend,
        vrf_id: u32,
        req: &RouteRequest,
    ) -> Result<()> {
        let prefix = req.parse_prefix()?;
        let nexthops = req.distinct_nexthops();

        let Some(route) = self.routes.get(&prefix) else {
            return self.route_install(backend, vrf_id, prefix, &nexthops);
        };

        let current = route.group;
        let grows = match current.and_then(|h| self.groups.get(h)) {
            Some(group) => nexthops.iter().any(|nh| !group.contains(&nh.id)),
            None => true,
        };

        match current {
            Some(handle) if !grows => self.route_refresh(backend, prefix, handle, &nexthops),
            _ => self.route_grow(backend, prefix, current, &nexthops),
        }
    }

    fn route_install(
        &mut self,
        backend: &dyn L3Backend,
        vrf_id: u32,
        prefix: IpPrefix,
        nexthops: &[&NextHopSpec],
    ) -> Result<()> {
        let ids: Vec<&str> = nexthops.iter().map(|nh| nh.id.as_str()).collect();

        let handle = match self.groups.lookup_by_members(&ids) {
            Some(handle) => {
                debug!(
                    "L3Manager: route {} reuses group {}",
                    prefix,
                    self.group_id(handle)
                );
                handle
            }
            None => {
                let members = nexthops
                    .iter()
                    .map(|spec| NextHop::create(&self.hosts, spec))
                    .collect::<Result<Vec<_>>>()?;
                self.register_group(backend, members)?
            }
        };

        let (group_id, size) = self.group_binding(Some(handle));
        let record = route_record(vrf_id, prefix, group_id, size);
        match backend.route_add(&record) {
            Ok(hw_index) => {
                debug!(
                    "L3Manager: route {} installed at {} via group {} size {}",
                    prefix, hw_index, group_id, size
                );
                self.routes.insert(RouteEntry {
                    prefix,
                    vrf_id,
                    group: Some(handle),
                    hw_index,
                });
                Ok(())
            }
            Err(e) => {
                error!("L3Manager: failed to install route {}: {}", prefix, e);
                self.groups.release(backend, handle);
                Err(L3Error::hw("route_add", e))
            }
        }
    }

    /// Moves the route to a group holding its current members plus the
    /// requested ones; the old group is released, never resized.
    fn route_grow(
        &mut self,
        backend: &dyn L3Backend,
        prefix: IpPrefix,
        old: Option<GroupHandle>,
        nexthops: &[&NextHopSpec],
    ) -> Result<()> {
        let mut members: Vec<NextHop> = Vec::new();
        if let Some(group) = old.and_then(|h| self.groups.get(h)) {
            for nh in group.members() {
                let mut dup = nh.clone();
                if let Some(spec) = nexthops.iter().find(|spec| spec.id == nh.id()) {
                    dup.set_record(nh.updated_record(&self.hosts, spec)?);
                }
                members.push(dup);
            }
        }
        for spec in nexthops {
            if !members.iter().any(|nh| nh.id() == spec.id) {
                members.push(NextHop::create(&self.hosts, spec)?);
            }
        }

        let new = self.register_group(backend, members)?;
        self.rebind(backend, prefix, old, Some(new))
    }

    /// Applies resolution changes to the route's group in place.
    ///
    /// The group may be shared, so every route using it sees the change.
    /// All new records are computed before any is applied, and a failed
    /// slot puts back the ones already written.
    fn route_refresh(
        &mut self,
        backend: &dyn L3Backend,
        prefix: IpPrefix,
        handle: GroupHandle,
        nexthops: &[&NextHopSpec],
    ) -> Result<()> {
        let group = self
            .groups
            .get(handle)
            .ok_or_else(|| L3Error::NotFound(format!("group of route {}", prefix)))?;

        let mut updates = Vec::new();
        for spec in nexthops {
            let Some(slot) = group.slot_of(&spec.id) else {
                continue;
            };
            let nh = &group.members()[slot];
            let record = nh.updated_record(&self.hosts, spec)?;
            if record != *nh.record() {
                updates.push((slot, record));
            }
        }
        let group_id = group.group_id();

        if updates.is_empty() {
            debug!("L3Manager: route {} unchanged", prefix);
            return Ok(());
        }

        let Some(group) = self.groups.get_mut(handle) else {
            return Ok(());
        };
        // A slot's software record changes only once hardware holds it.
        let mut applied: Vec<(usize, NextHopRecord)> = Vec::with_capacity(updates.len());
        for (slot, record) in updates {
            debug!(
                "L3Manager: group {} slot {} -> {}",
                group_id, slot, record.pkt_cmd
            );
            if let Err(e) = backend.nh_set(group_id, slot as u32, &record) {
                error!(
                    "L3Manager: failed to update group {} slot {}: {}",
                    group_id, slot, e
                );
                restore_slots(backend, group, group_id, applied);
                return Err(L3Error::hw("nh_set", e));
            }
            if let Some(nh) = group.member_at_mut(slot) {
                let previous = *nh.record();
                nh.set_record(record);
                applied.push((slot, previous));
            }
        }
        Ok(())
    }

    pub(crate) fn route_delete(&mut self, backend: &dyn L3Backend, req: &RouteRequest) -> Result<()> {
        let prefix = req.parse_prefix()?;
        let Some(route) = self.routes.remove(&prefix) else {
            warn!("L3Manager: unknown route {}", prefix);
            return Err(L3Error::NotFound(format!("route {}", prefix)));
        };

        let (group_id, size) = self.group_binding(route.group);
        if let Err(e) = backend.route_remove(&route.record(group_id, size)) {
            warn!("L3Manager: failed to remove route {} from hardware: {}", prefix, e);
        }
        if let Some(handle) = route.group {
            self.groups.release(backend, handle);
        }
        debug!("L3Manager: route {} deleted", prefix);
        Ok(())
    }

    /// Moves the route to a group without the named next-hops.
    pub(crate) fn route_delete_nexthop(
        &mut self,
        backend: &dyn L3Backend,
        req: &RouteRequest,
    ) -> Result<()> {
        let prefix = req.parse_prefix()?;
        let route = self.routes.get(&prefix).ok_or_else(|| {
            warn!("L3Manager: route {} not found", prefix);
            L3Error::NotFound(format!("route {}", prefix))
        })?;

        let Some(old) = route.group else {
            warn!("L3Manager: route {} does not have next-hops", prefix);
            return Ok(());
        };
        let Some(group) = self.groups.get(old) else {
            warn!("L3Manager: route {} points at a released group", prefix);
            return Ok(());
        };

        let survivors: Vec<NextHop> = group
            .members()
            .iter()
            .filter(|nh| !req.nexthops.iter().any(|spec| spec.id == nh.id()))
            .cloned()
            .collect();
        if survivors.len() == group.len() {
            debug!("L3Manager: route {} has none of the named next-hops", prefix);
            return Ok(());
        }

        let new = if survivors.is_empty() {
            debug!("L3Manager: route {} left without next-hops", prefix);
            None
        } else {
            Some(self.register_group(backend, survivors)?)
        };
        self.rebind(backend, prefix, Some(old), new)
    }

    /// Points the route at `new` in hardware, then swaps the references.
    ///
    /// On failure `new` is released and the route keeps `old`.
    fn rebind(
        &mut self,
        backend: &dyn L3Backend,
        prefix: IpPrefix,
        old: Option<GroupHandle>,
        new: Option<GroupHandle>,
    ) -> Result<()> {
        let (group_id, size) = self.group_binding(new);
        let Some(route) = self.routes.get_mut(&prefix) else {
            if let Some(new) = new {
                self.groups.release(backend, new);
            }
            return Err(L3Error::NotFound(format!("route {}", prefix)));
        };

        if let Err(e) = backend.route_update(&route.record(group_id, size)) {
            error!("L3Manager: failed to update route {}: {}", prefix, e);
            if let Some(new) = new {
                self.groups.release(backend, new);
            }
            return Err(L3Error::hw("route_update", e));
        }

        route.group = new;
        debug!(
            "L3Manager: route {} now via group {} size {}",
            prefix, group_id, size
        );
        if let Some(old) = old {
            self.groups.release(backend, old);
        }
        Ok(())
    }

    /// Reuses a registered group with the same members, or programs and
    /// registers a new one. The caller owns one reference to the result.
    fn register_group(&mut self, backend: &dyn L3Backend, members: Vec<NextHop>) -> Result<GroupHandle> {
        let mut candidate = self.groups.alloc(backend, members.len() as u32)?;
        for nh in members {
            if let Err(e) = candidate.push(nh) {
                self.groups.discard(backend, candidate);
                return Err(e);
            }
        }

        if let Some(existing) = self.groups.lookup_by_group(&candidate) {
            debug!(
                "L3Manager: reuse existing group {}",
                self.group_id(existing)
            );
            self.groups.discard(backend, candidate);
            return Ok(existing);
        }

        let group_id = candidate.group_id();
        let handle = self.groups.add(backend, candidate)?;
        debug!("L3Manager: created group {}", group_id);
        Ok(handle)
    }

    fn group_id(&self, handle: GroupHandle) -> NhGroupId {
        self.groups.get(handle).map_or(0, |g| g.group_id())
    }

    /// Group id and ECMP size a route record carries for `handle`.
    fn group_binding(&self, handle: Option<GroupHandle>) -> (NhGroupId, u32) {
        handle
            .and_then(|h| self.groups.get(h))
            .map_or((0, 0), |g| (g.group_id(), g.size()))
    }
}

/// Puts back the records a failed refresh already replaced.
///
/// A slot whose restore fails keeps its new record in software too, so the
/// group always mirrors what hardware holds.
fn restore_slots(
    backend: &dyn L3Backend,
    group: &mut NextHopGroup,
    group_id: NhGroupId,
    applied: Vec<(usize, NextHopRecord)>,
) {
    for (slot, previous) in applied.into_iter().rev() {
        match backend.nh_set(group_id, slot as u32, &previous) {
            Ok(()) => {
                if let Some(nh) = group.member_at_mut(slot) {
                    nh.set_record(previous);
                }
            }
            Err(e) => warn!(
                "L3Manager: failed to restore group {} slot {}: {}",
                group_id, slot, e
            ),
        }
    }
}
