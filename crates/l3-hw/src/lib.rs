//! Hardware backend contract for the L3 forwarding manager.
//!
//! The forwarding ASIC owns its own ID spaces (host table indices, next-hop
//! group ranges, route indices) and may relocate an existing host entry when
//! a new one is inserted. This crate describes that contract in Rust terms:
//!
//! - [`backend`]: the [`L3Backend`] trait the manager programs through
//! - [`records`]: typed hardware records (host, next-hop, route, hash field)
//! - [`error`]: driver status codes and [`HwError`]
//! - [`sim`]: [`SimBackend`], an in-memory backend with fault injection and
//!   scripted rehash, used by the daemon and by tests
//!
//! # Example
//!
//! ```
//! use l3_hw::{L3Backend, SimBackend};
//!
//! let hw = SimBackend::default();
//! let group = hw.nh_group_create(2).unwrap();
//! assert_eq!(group, 100);
//! assert_eq!(hw.group_count(), 1);
//! ```

pub mod backend;
pub mod error;
pub mod records;
pub mod sim;

pub use backend::L3Backend;
pub use error::{HwError, HwResult, HwStatus};
pub use records::{
    HashField, HostPlacement, HostRecord, HwIndex, InterfaceId, NextHopRecord, NhGroupId,
    PacketCommand, RouteRecord,
};
pub use sim::{SimBackend, SimConfig, SimOp};
