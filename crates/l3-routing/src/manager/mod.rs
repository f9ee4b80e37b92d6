//! The L3 manager façade.
//!
//! One [`L3Manager`] exists per VRF on a device. It owns the host, group and
//! route tables behind a single lock, and every table change and every
//! backend call happens while that lock is held.

mod route;
mod view;

pub use view::{GroupView, L3Counts, L3Snapshot, NextHopView, RouteView};

use l3_hw::{HwIndex, L3Backend, NhGroupId};
use l3_types::IpPrefix;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::L3ManagerConfig;
use crate::ecmp::EcmpHashFields;
use crate::error::{L3Error, Result};
use crate::host::{HostEntry, HostId, HostRequest, HostTable};
use crate::nexthop::NextHopError;
use crate::nhg::NhgTable;
use crate::route::{RouteAction, RouteRequest, RouteTable};
use crate::selftest::{InjectorShared, RouteInjector};

/// Tables guarded by the manager lock.
#[derive(Debug)]
pub(crate) struct L3State {
    pub(crate) hosts: HostTable,
    pub(crate) groups: NhgTable,
    pub(crate) routes: RouteTable,
    pub(crate) ecmp_hash: EcmpHashFields,
}

impl L3State {
    fn new(config: &L3ManagerConfig) -> Self {
        Self {
            hosts: HostTable::new(),
            groups: NhgTable::new(config.max_ecmp_paths),
            routes: RouteTable::new(),
            ecmp_hash: EcmpHashFields::default(),
        }
    }

    fn route_view(&self, prefix: &IpPrefix) -> Option<RouteView> {
        let route = self.routes.get(prefix)?;
        Some(RouteView {
            prefix: route.prefix,
            vrf_id: route.vrf_id,
            hw_index: route.hw_index,
            group: route
                .group
                .and_then(|h| self.groups.get(h))
                .map(GroupView::from),
        })
    }
}

/// L3 forwarding resource manager of one VRF.
pub struct L3Manager {
    config: L3ManagerConfig,
    backend: Arc<dyn L3Backend>,
    state: Mutex<L3State>,
    injector: Arc<InjectorShared>,
}

impl std::fmt::Debug for L3Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L3Manager")
            .field("vrf_name", &self.config.vrf_name)
            .field("vrf_id", &self.config.vrf_id)
            .finish_non_exhaustive()
    }
}

impl L3Manager {
    pub fn create(backend: Arc<dyn L3Backend>, config: L3ManagerConfig) -> Arc<Self> {
        info!(
            "L3Manager: created for VRF {} (id {}) on device {}",
            config.vrf_name, config.vrf_id, config.device_id
        );
        Arc::new(Self {
            state: Mutex::new(L3State::new(&config)),
            config,
            backend,
            injector: Arc::new(InjectorShared::default()),
        })
    }

    pub fn config(&self) -> &L3ManagerConfig {
        &self.config
    }

    pub fn vrf_name(&self) -> &str {
        &self.config.vrf_name
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, L3State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn injector_shared(&self) -> &Arc<InjectorShared> {
        &self.injector
    }

    /// Self-test route injector bound to this manager.
    pub fn injector(self: &Arc<Self>) -> RouteInjector {
        RouteInjector::new(Arc::clone(self))
    }

    /// Stops the injector and removes every route, group and host from
    /// hardware. The manager stays usable afterwards.
    pub fn destroy(&self) {
        if !self.injector.stop_and_wait(self.config.shutdown_grace()) {
            warn!(
                "L3Manager: route injector of VRF {} did not stop within {:?}",
                self.config.vrf_name,
                self.config.shutdown_grace()
            );
        }

        let backend = self.backend.as_ref();
        let mut st = self.lock();

        let routes = st.routes.take_all();
        let route_count = routes.len();
        for route in routes {
            let (group_id, size) = route
                .group
                .and_then(|h| st.groups.get(h))
                .map_or((0, 0), |g| (g.group_id(), g.size()));
            if let Err(e) = backend.route_remove(&route.record(group_id, size)) {
                warn!("L3Manager: failed to remove route {}: {}", route.prefix, e);
            }
            if let Some(handle) = route.group {
                st.groups.release(backend, handle);
            }
        }

        let group_count = st.groups.drain(backend);

        let host_ids = st.hosts.ids();
        let host_count = host_ids.len();
        for id in host_ids {
            if let Err(e) = st.hosts.delete(backend, id) {
                warn!("L3Manager: failed to remove host {}: {}", id, e);
            }
        }

        info!(
            "L3Manager: VRF {} drained: {} routes, {} leftover groups, {} hosts",
            self.config.vrf_name, route_count, group_count, host_count
        );
    }

    pub fn add_host(&self, req: &HostRequest) -> Result<HostId> {
        let record = req.to_record(self.config.vrf_id)?;
        let mut st = self.lock();
        let id = st
            .hosts
            .add(self.backend.as_ref(), record)
            .inspect_err(|e| error!("L3Manager: failed to add host {}: {}", req.address, e))?;
        debug!("L3Manager: host {} added with id {}", req.address, id);
        Ok(id)
    }

    pub fn delete_host(&self, id: HostId) -> Result<()> {
        let mut st = self.lock();
        match st.hosts.delete(self.backend.as_ref(), id) {
            Ok(entry) => {
                debug!("L3Manager: host {} id {} deleted", entry.address(), id);
                Ok(())
            }
            Err(e @ L3Error::NotFound(_)) => {
                warn!("L3Manager: delete of unknown host id {}", id);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn host(&self, id: HostId) -> Option<HostEntry> {
        self.lock().hosts.get(id).cloned()
    }

    pub fn host_by_hw_index(&self, index: HwIndex) -> Option<HostEntry> {
        self.lock().hosts.get_by_index(index).cloned()
    }

    /// Applies a route request.
    ///
    /// When an `Add` fails, every next-hop of `req` carries the error.
    pub fn route_action(&self, action: RouteAction, req: &mut RouteRequest) -> Result<()> {
        debug!(
            "L3Manager: vrf {} {} {} with {} next-hops",
            self.config.vrf_id,
            action,
            req.prefix,
            req.nexthops.len()
        );

        let result = self.apply_route(action, req);

        if let Err(e) = &result {
            if action == RouteAction::Add {
                let code = e.errno();
                let message = e.to_string();
                for nh in &mut req.nexthops {
                    nh.error = Some(NextHopError {
                        code,
                        message: message.clone(),
                    });
                }
            }
        }
        result
    }

    fn apply_route(&self, action: RouteAction, req: &RouteRequest) -> Result<()> {
        req.require_nexthops()?;

        let backend = self.backend.as_ref();
        let mut st = self.lock();
        match action {
            RouteAction::Add => st.route_add(backend, self.config.vrf_id, req),
            RouteAction::Delete => st.route_delete(backend, req),
            RouteAction::DeleteNexthop => st.route_delete_nexthop(backend, req),
        }
    }

    /// Enables or disables ECMP hash fields.
    ///
    /// The stored mask changes only once the hardware accepted the new
    /// field list.
    pub fn ecmp_hash_set(&self, fields: EcmpHashFields, enable: bool) -> Result<()> {
        let mut st = self.lock();
        let next = st.ecmp_hash.apply(fields, enable).inspect_err(|e| {
            error!(
                "L3Manager: rejected ECMP hash change {} enable={}: {}",
                fields, enable, e
            )
        })?;

        self.backend
            .hash_fields_set(&next.hash_fields())
            .map_err(|e| L3Error::hw("hash_fields_set", e))?;
        st.ecmp_hash = next;
        info!("L3Manager: ECMP hash fields now {}", next);
        Ok(())
    }

    pub fn ecmp_hash(&self) -> EcmpHashFields {
        self.lock().ecmp_hash
    }

    /// Route by prefix text (`10.0.0.0/24`, `2001:db8::/32`).
    pub fn route(&self, prefix: &str) -> Option<RouteView> {
        let prefix: IpPrefix = prefix.parse().ok()?;
        self.lock().route_view(&prefix)
    }

    pub fn group(&self, group_id: NhGroupId) -> Option<GroupView> {
        self.lock().groups.by_group_id(group_id).map(GroupView::from)
    }

    pub fn counts(&self) -> L3Counts {
        let st = self.lock();
        L3Counts {
            hosts: st.hosts.len(),
            routes: st.routes.len(),
            groups: st.groups.len(),
        }
    }

    pub fn snapshot(&self) -> L3Snapshot {
        let st = self.lock();
        L3Snapshot {
            taken_at: chrono::Utc::now(),
            vrf_name: self.config.vrf_name.clone(),
            vrf_id: self.config.vrf_id,
            ecmp_hash: st.ecmp_hash,
            hosts: st.hosts.iter().cloned().collect(),
            routes: st
                .routes
                .iter()
                .filter_map(|r| st.route_view(&r.prefix))
                .collect(),
            groups: st.groups.iter().map(GroupView::from).collect(),
        }
    }
}
