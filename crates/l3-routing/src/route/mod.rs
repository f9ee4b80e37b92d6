//! IP routes and the requests that install them.

mod table;
mod types;

pub use table::RouteTable;
pub(crate) use types::route_record;
pub use types::{RouteAction, RouteEntry, RouteRequest};
