//! L3 forwarding resource manager.
//!
//! Keeps the host, next-hop group and route state of a switch ASIC in step
//! with a hardware backend that owns its own id space and may relocate host
//! entries when new ones are inserted.
//!
//! # Architecture
//!
//! ```text
//! [control plane] ──> [L3Manager] ──┬─> [HostTable]
//!                         │         ├─> [NhgTable]  (dedup + refcount)
//!                         │         └─> [RouteTable]
//!                         ↓
//!                   [L3Backend] ──> [ASIC / SimBackend]
//! ```
//!
//! # Key Components
//!
//! - [`L3Manager`]: per-VRF façade; one lock serializes every table change
//!   and backend call
//! - [`NhgTable`]: groups shared by all routes with the same next-hop set
//! - [`HostTable`]: host entries with recycled ids and rehash tracking
//! - [`VrfRegistry`]: managers by VRF name
//! - [`RouteInjector`]: bulk route add/delete for load tests
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use l3_hw::SimBackend;
//! use l3_routing::{HostRequest, L3Manager, L3ManagerConfig, NextHopSpec, RouteAction, RouteRequest};
//! use l3_types::AddressFamily;
//!
//! let mgr = L3Manager::create(Arc::new(SimBackend::default()), L3ManagerConfig::default());
//! let host = mgr
//!     .add_host(&HostRequest::remote(AddressFamily::Ipv4, "10.0.0.1", "aa:bb:cc:dd:ee:01"))
//!     .unwrap();
//!
//! let mut req = RouteRequest::new(AddressFamily::Ipv4, "10.0.0.0/24")
//!     .with_nexthop(NextHopSpec::resolved("10.0.0.1", host));
//! mgr.route_action(RouteAction::Add, &mut req).unwrap();
//!
//! assert_eq!(mgr.route("10.0.0.0/24").unwrap().group_id(), Some(100));
//! ```

pub mod command;
pub mod config;
pub mod ecmp;
pub mod error;
pub mod host;
pub mod manager;
pub mod nexthop;
pub mod nhg;
pub mod registry;
pub mod route;
pub mod selftest;
pub mod show;

pub use command::{CommandOutput, L3Command};
pub use config::{DaemonConfig, L3ManagerConfig, DEFAULT_MAX_ECMP_PATHS};
pub use ecmp::EcmpHashFields;
pub use error::{L3Error, Result};
pub use host::{HostEntry, HostId, HostRequest, HostTable};
pub use manager::{GroupView, L3Counts, L3Manager, L3Snapshot, NextHopView, RouteView};
pub use nexthop::{NextHop, NextHopError, NextHopKind, NextHopSpec, NextHopState};
pub use nhg::{GroupHandle, NextHopGroup, NhgTable};
pub use registry::VrfRegistry;
pub use route::{RouteAction, RouteEntry, RouteRequest, RouteTable};
pub use selftest::{InjectorMode, InjectorRun, InjectorSource, InjectorStats, RouteInjector};
pub use show::{show_injector, show_summary};
