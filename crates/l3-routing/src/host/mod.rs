//! Directly resolved host (ARP/ND) entries.

mod table;
mod types;

pub use table::HostTable;
pub use types::{HostEntry, HostId, HostRequest};
