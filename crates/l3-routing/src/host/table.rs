//! Host table with stable, recycled ids and rehash-aware hardware indices.

use l3_hw::{HostRecord, HwIndex, L3Backend};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};

use super::types::{HostEntry, HostId};
use crate::error::{L3Error, Result};

/// Host entries indexed by stable id and by current hardware index.
///
/// The hardware index of an entry is owned by the backend and may change
/// whenever another entry is inserted. `by_index` is the only place that
/// maps an index back to an id, and it is rewritten in the same step that
/// records a relocation, so both lookups always agree.
#[derive(Debug, Default)]
pub struct HostTable {
    entries: BTreeMap<HostId, HostEntry>,
    by_index: HashMap<HwIndex, HostId>,
    next_host_id: HostId,
    /// Freed ids, reused most-recently-freed first.
    free_ids: Vec<HostId>,
}

impl HostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct ids ever handed out.
    pub fn ids_allocated(&self) -> u32 {
        self.next_host_id
    }

    pub fn get(&self, id: HostId) -> Option<&HostEntry> {
        self.entries.get(&id)
    }

    pub fn get_by_index(&self, index: HwIndex) -> Option<&HostEntry> {
        self.by_index.get(&index).and_then(|id| self.entries.get(id))
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &HostEntry> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<HostId> {
        self.entries.keys().copied().collect()
    }

    fn alloc_id(&mut self) -> HostId {
        match self.free_ids.pop() {
            Some(id) => id,
            None => {
                let id = self.next_host_id;
                self.next_host_id += 1;
                id
            }
        }
    }

    fn free_id(&mut self, id: HostId) {
        self.free_ids.push(id);
    }

    /// Programs `record` and indexes the new entry.
    ///
    /// On backend failure the id goes back to the free list.
    pub fn add(&mut self, backend: &dyn L3Backend, record: HostRecord) -> Result<HostId> {
        let id = self.alloc_id();

        let placement = match backend.host_add(&record) {
            Ok(placement) => placement,
            Err(e) => {
                self.free_id(id);
                return Err(L3Error::hw("host_add", e));
            }
        };

        if placement.relocated() {
            self.relocate(placement.settled, placement.rehash);
        }

        debug!(
            "HostTable: host {} id {} at index {}",
            record.address, id, placement.settled
        );
        self.by_index.insert(placement.settled, id);
        self.entries.insert(
            id,
            HostEntry {
                id,
                hw_index: placement.settled,
                record,
            },
        );
        Ok(id)
    }

    /// Records that the entry at `from` now lives at `to`.
    fn relocate(&mut self, from: HwIndex, to: HwIndex) {
        let Some(moved) = self.by_index.remove(&from) else {
            return;
        };
        if let Some(entry) = self.entries.get_mut(&moved) {
            debug!(
                "HostTable: host {} id {} rehashed {} -> {}",
                entry.record.address, moved, from, to
            );
            entry.hw_index = to;
        }
        self.by_index.insert(to, moved);
    }

    /// Removes the entry with `id` from both indices and from hardware.
    ///
    /// Hardware removal goes by index, not by content. The software entry is
    /// gone and its id recycled even if the backend call fails.
    pub fn delete(&mut self, backend: &dyn L3Backend, id: HostId) -> Result<HostEntry> {
        let entry = self
            .entries
            .remove(&id)
            .ok_or_else(|| L3Error::NotFound(format!("host id {}", id)))?;

        if self.by_index.get(&entry.hw_index) == Some(&id) {
            self.by_index.remove(&entry.hw_index);
        }
        self.free_id(id);

        backend
            .host_remove_by_index(entry.hw_index, entry.family())
            .map_err(|e| {
                warn!(
                    "HostTable: failed to remove host {} at index {}: {}",
                    entry.record.address, entry.hw_index, e
                );
                L3Error::hw("host_remove_by_index", e)
            })?;

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostRequest;
    use l3_hw::{HwStatus, SimBackend, SimOp};
    use l3_types::AddressFamily;
    use pretty_assertions::assert_eq;

    fn record(addr: &str) -> HostRecord {
        HostRequest::remote(AddressFamily::Ipv4, addr, "aa:bb:cc:dd:ee:01")
            .to_record(0)
            .unwrap()
    }

    #[test]
    fn test_ids_start_at_zero_and_recycle() {
        let hw = SimBackend::default();
        let mut table = HostTable::new();

        assert_eq!(table.add(&hw, record("10.0.0.1")).unwrap(), 0);
        assert_eq!(table.add(&hw, record("10.0.0.2")).unwrap(), 1);

        table.delete(&hw, 0).unwrap();
        assert_eq!(table.add(&hw, record("10.0.0.3")).unwrap(), 0);
        assert_eq!(table.ids_allocated(), 2);
    }

    #[test]
    fn test_failed_add_returns_id() {
        let hw = SimBackend::default();
        let mut table = HostTable::new();
        hw.inject_fault(SimOp::HostAdd, HwStatus::Failure);

        let err = table.add(&hw, record("10.0.0.1")).unwrap_err();
        assert!(matches!(err, L3Error::HardwareRejected { .. }));
        assert!(table.is_empty());

        assert_eq!(table.add(&hw, record("10.0.0.1")).unwrap(), 0);
        assert_eq!(table.ids_allocated(), 1);
    }

    #[test]
    fn test_delete_unknown_has_no_side_effects() {
        let hw = SimBackend::default();
        let mut table = HostTable::new();
        table.add(&hw, record("10.0.0.1")).unwrap();

        assert!(matches!(table.delete(&hw, 9), Err(L3Error::NotFound(_))));
        assert_eq!(table.len(), 1);
        assert_eq!(hw.calls(SimOp::HostRemove), 0);
        assert_eq!(table.add(&hw, record("10.0.0.2")).unwrap(), 1);
    }

    #[test]
    fn test_rehash_relocates_existing_entry() {
        let hw = SimBackend::default();
        let mut table = HostTable::new();
        let first = table.add(&hw, record("10.0.0.1")).unwrap();
        assert_eq!(table.get(first).unwrap().hw_index, 0);

        hw.script_rehash(0);
        let second = table.add(&hw, record("10.0.0.2")).unwrap();

        let moved = table.get(first).unwrap();
        assert_eq!(moved.hw_index, 1);
        assert_eq!(table.get_by_index(1).unwrap().id, first);
        assert_eq!(table.get_by_index(0).unwrap().id, second);

        table.delete(&hw, first).unwrap();
        assert_eq!(hw.host_at(0).unwrap().address.to_string(), "10.0.0.2");
        assert!(hw.host_at(1).is_none());
    }

    #[test]
    fn test_hardware_remove_failure_still_frees() {
        let hw = SimBackend::default();
        let mut table = HostTable::new();
        let id = table.add(&hw, record("10.0.0.1")).unwrap();
        hw.inject_fault(SimOp::HostRemove, HwStatus::Failure);

        assert!(matches!(
            table.delete(&hw, id),
            Err(L3Error::HardwareRejected { .. })
        ));
        assert!(table.get(id).is_none());
        assert_eq!(table.add(&hw, record("10.0.0.2")).unwrap(), id);
    }
}
