//! Manager and daemon configuration.

use anyhow::Context;
use l3_hw::SimConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Hardware ceiling on next-hops per route.
pub const DEFAULT_MAX_ECMP_PATHS: u32 = 32;

/// Configuration of one L3 manager (one VRF on one device).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct L3ManagerConfig {
    pub device_id: u32,
    pub vrf_id: u32,
    pub vrf_name: String,
    /// Largest next-hop group the hardware accepts.
    pub max_ecmp_paths: u32,
    /// Whether the bulk route injector may be started.
    pub selftest_enabled: bool,
    /// Seconds `destroy` waits for a running injector to stop.
    pub shutdown_grace_secs: u64,
}

impl Default for L3ManagerConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            vrf_id: 0,
            vrf_name: "vrf_default".to_string(),
            max_ecmp_paths: DEFAULT_MAX_ECMP_PATHS,
            selftest_enabled: true,
            shutdown_grace_secs: 3,
        }
    }
}

impl L3ManagerConfig {
    pub fn for_vrf(name: impl Into<String>, vrf_id: u32) -> Self {
        Self {
            vrf_id,
            vrf_name: name.into(),
            ..Self::default()
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Configuration file of the `l3routed` daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub vrfs: Vec<L3ManagerConfig>,
    pub backend: SimConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            vrfs: vec![L3ManagerConfig::default()],
            backend: SimConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Loads a YAML configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: DaemonConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.vrfs.is_empty() {
            anyhow::bail!("at least one VRF must be configured");
        }
        for (i, vrf) in self.vrfs.iter().enumerate() {
            if vrf.max_ecmp_paths == 0 {
                anyhow::bail!("vrf {}: max_ecmp_paths must be at least 1", vrf.vrf_name);
            }
            if self.vrfs[..i].iter().any(|v| v.vrf_name == vrf.vrf_name) {
                anyhow::bail!("vrf {} configured twice", vrf.vrf_name);
            }
        }
        Ok(())
    }
}
