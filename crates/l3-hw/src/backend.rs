//! The backend trait the L3 manager programs hardware through.

use crate::error::HwResult;
use crate::records::{
    HashField, HostPlacement, HostRecord, HwIndex, NextHopRecord, NhGroupId, RouteRecord,
};
use l3_types::AddressFamily;

/// Forwarding hardware as seen by the L3 manager.
///
/// All calls are synchronous and bounded. The manager serializes them under
/// its own lock, so implementations only need interior mutability, not
/// their own ordering guarantees.
pub trait L3Backend: Send + Sync {
    /// Inserts a host entry. See [`HostPlacement`] for the rehash contract.
    fn host_add(&self, record: &HostRecord) -> HwResult<HostPlacement>;

    /// Removes the host entry at `index`.
    fn host_remove_by_index(&self, index: HwIndex, family: AddressFamily) -> HwResult<()>;

    /// Reserves a contiguous next-hop range of `size` slots.
    fn nh_group_create(&self, size: u32) -> HwResult<NhGroupId>;

    /// Releases a range obtained from [`L3Backend::nh_group_create`].
    fn nh_group_destroy(&self, group_id: NhGroupId, size: u32) -> HwResult<()>;

    /// Programs slot `slot` of group `group_id` (hardware next-hop `group_id + slot`).
    fn nh_set(&self, group_id: NhGroupId, slot: u32, record: &NextHopRecord) -> HwResult<()>;

    /// Clears slot `slot` of group `group_id`.
    fn nh_clear(&self, group_id: NhGroupId, slot: u32) -> HwResult<()>;

    /// Installs a route and returns its hardware index.
    fn route_add(&self, record: &RouteRecord) -> HwResult<HwIndex>;

    /// Re-points an installed route at a different next-hop range.
    fn route_update(&self, record: &RouteRecord) -> HwResult<()>;

    fn route_remove(&self, record: &RouteRecord) -> HwResult<()>;

    /// Replaces the list of header fields fed into the ECMP hash.
    fn hash_fields_set(&self, fields: &[HashField]) -> HwResult<()>;
}
