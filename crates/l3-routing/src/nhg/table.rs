//! Deduplicated, reference-counted next-hop group table.

use l3_hw::{L3Backend, NhGroupId};
use log::{debug, warn};
use std::collections::HashMap;

use super::group::{member_hash, NextHopGroup};
use crate::error::{L3Error, Result};

/// Handle to a registered group.
///
/// Handles carry the generation of their arena slot, so a handle kept past
/// the group's destruction resolves to nothing instead of to whichever group
/// reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    group: Option<NextHopGroup>,
}

/// Registered groups, addressed by handle and bucketed by member hash.
#[derive(Debug)]
pub struct NhgTable {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    buckets: HashMap<u64, Vec<GroupHandle>>,
    by_group_id: HashMap<NhGroupId, GroupHandle>,
    max_ecmp_paths: u32,
}

impl NhgTable {
    pub fn new(max_ecmp_paths: u32) -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            buckets: HashMap::new(),
            by_group_id: HashMap::new(),
            max_ecmp_paths,
        }
    }

    pub fn max_ecmp_paths(&self) -> u32 {
        self.max_ecmp_paths
    }

    pub fn len(&self) -> usize {
        self.by_group_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_group_id.is_empty()
    }

    pub fn get(&self, handle: GroupHandle) -> Option<&NextHopGroup> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.group.as_ref())
    }

    pub(crate) fn get_mut(&mut self, handle: GroupHandle) -> Option<&mut NextHopGroup> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.group.as_mut())
    }

    pub fn handle_of(&self, group_id: NhGroupId) -> Option<GroupHandle> {
        self.by_group_id.get(&group_id).copied()
    }

    pub fn by_group_id(&self, group_id: NhGroupId) -> Option<&NextHopGroup> {
        self.handle_of(group_id).and_then(|h| self.get(h))
    }

    /// Registered groups in group id order.
    pub fn iter(&self) -> impl Iterator<Item = &NextHopGroup> {
        let mut groups: Vec<&NextHopGroup> = self
            .slots
            .iter()
            .filter_map(|slot| slot.group.as_ref())
            .collect();
        groups.sort_by_key(|g| g.group_id());
        groups.into_iter()
    }

    fn find(&self, hash: u64, matches: impl Fn(&NextHopGroup) -> bool) -> Option<GroupHandle> {
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|&h| self.get(h).is_some_and(&matches))
    }

    /// Dedup lookup by a set of distinct next-hop ids.
    ///
    /// On a match the group gains a reference held by the caller.
    pub fn lookup_by_members(&mut self, ids: &[&str]) -> Option<GroupHandle> {
        let hash = member_hash(ids.iter().copied());
        let handle = self.find(hash, |g| g.has_members(ids))?;
        self.acquire(handle);
        Some(handle)
    }

    /// Dedup lookup for a group built in memory but not registered.
    ///
    /// On a match the registered group gains a reference held by the caller.
    pub fn lookup_by_group(&mut self, candidate: &NextHopGroup) -> Option<GroupHandle> {
        let handle = self.find(candidate.member_hash(), |g| g.same_members(candidate))?;
        self.acquire(handle);
        Some(handle)
    }

    /// Reserves a hardware range for a group of `size` next-hops.
    ///
    /// The returned group is empty, unregistered and holds one reference.
    pub fn alloc(&self, backend: &dyn L3Backend, size: u32) -> Result<NextHopGroup> {
        if size == 0 {
            return Err(L3Error::InvalidArgument(
                "next-hop group needs at least one next-hop".to_string(),
            ));
        }
        if size > self.max_ecmp_paths {
            return Err(L3Error::ResourceExhausted(format!(
                "{} next-hops exceed the ECMP maximum of {}",
                size, self.max_ecmp_paths
            )));
        }
        let group_id = backend
            .nh_group_create(size)
            .map_err(|e| L3Error::hw("nh_group_create", e))?;
        debug!("NhgTable: allocated group {} size {}", group_id, size);
        Ok(NextHopGroup::new(group_id, size))
    }

    /// Programs every member of `group` and registers it.
    ///
    /// On a hardware failure the group's slots and range are released before
    /// the error is returned.
    pub fn add(&mut self, backend: &dyn L3Backend, group: NextHopGroup) -> Result<GroupHandle> {
        for (slot, nh) in group.members().iter().enumerate() {
            debug!(
                "NhgTable: group {} slot {} -> {} ({})",
                group.group_id(),
                slot,
                nh.id(),
                nh.record().pkt_cmd
            );
            if let Err(e) = backend.nh_set(group.group_id(), slot as u32, nh.record()) {
                warn!(
                    "NhgTable: failed to program {} in group {}: {}",
                    nh.id(),
                    group.group_id(),
                    e
                );
                free_hw(backend, &group);
                return Err(L3Error::hw("nh_set", e));
            }
        }

        let handle = self.insert(group);
        Ok(handle)
    }

    fn insert(&mut self, group: NextHopGroup) -> GroupHandle {
        let hash = group.member_hash();
        let group_id = group.group_id();

        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.group = Some(group);
        let handle = GroupHandle {
            index,
            generation: slot.generation,
        };

        self.buckets.entry(hash).or_default().push(handle);
        self.by_group_id.insert(group_id, handle);
        handle
    }

    fn remove(&mut self, handle: GroupHandle) -> Option<NextHopGroup> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?;
        let group = slot.group.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(handle.index);

        if let Some(bucket) = self.buckets.get_mut(&group.member_hash()) {
            bucket.retain(|&h| h != handle);
            if bucket.is_empty() {
                self.buckets.remove(&group.member_hash());
            }
        }
        self.by_group_id.remove(&group.group_id());
        Some(group)
    }

    /// Releases the hardware range of a group that was never programmed.
    pub fn discard(&self, backend: &dyn L3Backend, group: NextHopGroup) {
        debug!("NhgTable: discarding group {}", group.group_id());
        if let Err(e) = backend.nh_group_destroy(group.group_id(), group.size()) {
            warn!(
                "NhgTable: failed to destroy group {}: {}",
                group.group_id(),
                e
            );
        }
    }

    /// Clears the slots and range of a group no longer referenced.
    pub fn free(&self, backend: &dyn L3Backend, group: NextHopGroup) {
        debug!("NhgTable: freeing group {}", group.group_id());
        free_hw(backend, &group);
    }

    /// Takes another reference on a registered group.
    pub fn acquire(&mut self, handle: GroupHandle) -> Option<u32> {
        let group = self.get_mut(handle)?;
        let count = group.acquire();
        debug!(
            "NhgTable: group {} refcount {}",
            group.group_id(),
            count
        );
        Some(count)
    }

    /// Drops a reference and frees the group when none are left.
    ///
    /// Returns the remaining count, or `None` for a stale handle.
    pub fn release(&mut self, backend: &dyn L3Backend, handle: GroupHandle) -> Option<u32> {
        let Some(group) = self.get_mut(handle) else {
            warn!("NhgTable: release of unknown group handle {:?}", handle);
            return None;
        };
        let count = group.release();
        debug!(
            "NhgTable: group {} refcount {}",
            group.group_id(),
            count
        );
        if count == 0 {
            if let Some(group) = self.remove(handle) {
                self.free(backend, group);
            }
        }
        Some(count)
    }

    /// Frees every registered group regardless of its refcount.
    pub fn drain(&mut self, backend: &dyn L3Backend) -> usize {
        let handles: Vec<GroupHandle> = self.by_group_id.values().copied().collect();
        let mut freed = 0;
        for handle in handles {
            if let Some(group) = self.remove(handle) {
                self.free(backend, group);
                freed += 1;
            }
        }
        freed
    }
}

/// Clears every slot of `group`, then destroys its range.
fn free_hw(backend: &dyn L3Backend, group: &NextHopGroup) {
    for slot in 0..group.len() as u32 {
        if let Err(e) = backend.nh_clear(group.group_id(), slot) {
            warn!(
                "NhgTable: failed to clear slot {} of group {}: {}",
                slot,
                group.group_id(),
                e
            );
        }
    }
    if let Err(e) = backend.nh_group_destroy(group.group_id(), group.size()) {
        warn!(
            "NhgTable: failed to destroy group {}: {}",
            group.group_id(),
            e
        );
    }
}
