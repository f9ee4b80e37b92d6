//! ECMP next-hop groups.
//!
//! Routes whose next-hop id sets are equal share one group. A group's
//! hardware range is sized at creation, so membership changes build a new
//! group and swap the route's reference instead of resizing in place.

mod group;
mod table;

pub use group::{member_hash, NextHopGroup};
pub use table::{GroupHandle, NhgTable};
