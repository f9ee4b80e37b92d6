//! A single next-hop group and its member hash.

use l3_hw::NhGroupId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::{L3Error, Result};
use crate::nexthop::NextHop;

/// Order-independent hash over a set of next-hop ids.
///
/// Each id is hashed on its own and the results are summed, so any
/// permutation of the same ids lands in the same bucket.
pub fn member_hash<'a>(ids: impl IntoIterator<Item = &'a str>) -> u64 {
    ids.into_iter().fold(0u64, |acc, id| acc.wrapping_add(id_hash(id)))
}

fn id_hash(id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    hasher.finish()
}

/// A hardware next-hop range of `size` slots and the next-hops in it.
///
/// Member `i` (in insertion order) lives in hardware slot `group_id + i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHopGroup {
    group_id: NhGroupId,
    size: u32,
    members: Vec<NextHop>,
    member_hash: u64,
    ref_count: u32,
}

impl NextHopGroup {
    /// A fresh, empty group holding one reference.
    pub(crate) fn new(group_id: NhGroupId, size: u32) -> Self {
        Self {
            group_id,
            size,
            members: Vec::with_capacity(size as usize),
            member_hash: 0,
            ref_count: 1,
        }
    }

    pub fn group_id(&self) -> NhGroupId {
        self.group_id
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[NextHop] {
        &self.members
    }

    pub fn member_hash(&self) -> u64 {
        self.member_hash
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|nh| nh.id())
    }

    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.members.iter().position(|nh| nh.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slot_of(id).is_some()
    }

    pub fn member(&self, id: &str) -> Option<&NextHop> {
        self.members.iter().find(|nh| nh.id() == id)
    }

    pub(crate) fn member_at_mut(&mut self, slot: usize) -> Option<&mut NextHop> {
        self.members.get_mut(slot)
    }

    /// Appends `nh` in the next free slot.
    pub(crate) fn push(&mut self, nh: NextHop) -> Result<()> {
        if self.members.len() >= self.size as usize {
            return Err(L3Error::InvalidArgument(format!(
                "group {} is full ({} slots)",
                self.group_id, self.size
            )));
        }
        self.member_hash = self.member_hash.wrapping_add(id_hash(nh.id()));
        self.members.push(nh);
        Ok(())
    }

    /// True when the group is full and holds exactly `ids`.
    ///
    /// `ids` must not contain duplicates.
    pub fn has_members(&self, ids: &[&str]) -> bool {
        self.size as usize == ids.len()
            && self.members.len() == ids.len()
            && ids.iter().all(|id| self.contains(id))
    }

    /// True when both groups hold the same set of next-hop ids.
    pub fn same_members(&self, other: &NextHopGroup) -> bool {
        self.size == other.size
            && self.members.len() == other.members.len()
            && other.member_ids().all(|id| self.contains(id))
    }

    pub(crate) fn acquire(&mut self) -> u32 {
        self.ref_count += 1;
        self.ref_count
    }

    /// Drops one reference; never goes below zero.
    pub(crate) fn release(&mut self) -> u32 {
        self.ref_count = self.ref_count.saturating_sub(1);
        self.ref_count
    }
}
