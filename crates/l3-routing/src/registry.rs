//! Per-VRF manager registry.

use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{L3Error, Result};
use crate::manager::L3Manager;

/// Managers of every VRF on a device, by VRF name.
#[derive(Debug, Default)]
pub struct VrfRegistry {
    managers: RwLock<BTreeMap<String, Arc<L3Manager>>>,
}

impl VrfRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `manager` under its VRF name.
    pub fn register(&self, manager: Arc<L3Manager>) -> Result<()> {
        let name = manager.vrf_name().to_string();
        let mut managers = self.managers.write().unwrap_or_else(PoisonError::into_inner);
        if managers.contains_key(&name) {
            return Err(L3Error::InvalidArgument(format!(
                "VRF {} already registered",
                name
            )));
        }
        info!("VrfRegistry: registered VRF {}", name);
        managers.insert(name, manager);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<L3Manager>> {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Removes the VRF and drains its manager.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let manager = self
            .managers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        match manager {
            Some(manager) => {
                manager.destroy();
                info!("VrfRegistry: unregistered VRF {}", name);
                Ok(())
            }
            None => {
                warn!("VrfRegistry: unknown VRF {}", name);
                Err(L3Error::NotFound(format!("VRF {}", name)))
            }
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Managers in VRF name order.
    pub fn managers(&self) -> Vec<Arc<L3Manager>> {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.managers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unregisters and drains every VRF.
    pub fn destroy_all(&self) {
        let managers =
            std::mem::take(&mut *self.managers.write().unwrap_or_else(PoisonError::into_inner));
        for (name, manager) in managers {
            manager.destroy();
            info!("VrfRegistry: unregistered VRF {}", name);
        }
    }
}
