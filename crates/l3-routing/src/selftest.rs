//! Bulk route injector for load testing a manager.
//!
//! The injector adds or deletes a run of IPv4 routes, each through a single
//! unresolved port next-hop. Every route goes through
//! [`L3Manager::route_action`], so each one takes and releases the manager
//! lock like any other caller. A stop request is honored between routes.

use l3_types::{AddressFamily, IpPrefix};
use log::{debug, error, info};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{L3Error, Result};
use crate::manager::L3Manager;
use crate::nexthop::{NextHopSpec, NextHopState};
use crate::route::{RouteAction, RouteRequest};

/// Where the injected prefixes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectorSource {
    /// Consecutive IPv4 prefixes of the same length starting here.
    Prefix(IpPrefix),
    /// A route file: the number of routes, then `<mask_len> <hex ipv4>`
    /// pairs, separated by whitespace.
    File(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectorMode {
    #[default]
    Idle,
    Populating,
    Deleting,
}

/// Counters of the current or last injector run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct InjectorStats {
    pub running: bool,
    pub mode: InjectorMode,
    /// Routes added or deleted by the last run.
    pub updated: u64,
    /// Injected routes currently installed.
    pub active: u64,
    /// Routes the last run skipped because the manager returned an error.
    pub errors: u64,
    /// Time spent inside route operations during the last run.
    pub exec_time: Duration,
}

/// Injector state shared between a manager and its runs.
#[derive(Debug, Default)]
pub(crate) struct InjectorShared {
    kickout: AtomicBool,
    stats: Mutex<InjectorStats>,
    idle: Condvar,
}

impl InjectorShared {
    fn lock(&self) -> MutexGuard<'_, InjectorStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn stats(&self) -> InjectorStats {
        self.lock().clone()
    }

    pub(crate) fn request_stop(&self) {
        self.kickout.store(true, Ordering::SeqCst);
    }

    /// Asks a running injector to stop and waits up to `grace` for it.
    ///
    /// Returns false if it was still running when the grace period ran out.
    pub(crate) fn stop_and_wait(&self, grace: Duration) -> bool {
        let stats = self.lock();
        if !stats.running {
            return true;
        }
        self.request_stop();
        let (stats, _) = self
            .idle
            .wait_timeout_while(stats, grace, |s| s.running)
            .unwrap_or_else(PoisonError::into_inner);
        !stats.running
    }

    fn finish(&self) {
        let mut stats = self.lock();
        stats.running = false;
        self.idle.notify_all();
    }
}

/// Starts injector runs against one manager.
#[derive(Debug, Clone)]
pub struct RouteInjector {
    manager: Arc<L3Manager>,
}

impl RouteInjector {
    pub(crate) fn new(manager: Arc<L3Manager>) -> Self {
        Self { manager }
    }

    fn shared(&self) -> &Arc<InjectorShared> {
        self.manager.injector_shared()
    }

    /// Prepares a run adding `count` routes from `source`.
    pub fn start_add(&self, source: &InjectorSource, count: u32, ignore_errors: bool) -> Result<InjectorRun> {
        self.start(RouteAction::Add, source, count, ignore_errors)
    }

    /// Prepares a run deleting `count` routes from `source`, stopping a
    /// running test first. Delete errors are always skipped.
    pub fn start_delete(&self, source: &InjectorSource, count: u32) -> Result<InjectorRun> {
        self.shared()
            .stop_and_wait(self.manager.config().shutdown_grace());
        self.start(RouteAction::Delete, source, count, true)
    }

    pub fn stop(&self) {
        self.shared().request_stop();
    }

    pub fn stats(&self) -> InjectorStats {
        self.shared().stats()
    }

    fn start(
        &self,
        action: RouteAction,
        source: &InjectorSource,
        count: u32,
        ignore_errors: bool,
    ) -> Result<InjectorRun> {
        if !self.manager.config().selftest_enabled {
            return Err(L3Error::Unsupported(format!(
                "route injector disabled on VRF {}",
                self.manager.vrf_name()
            )));
        }

        let shared = Arc::clone(self.shared());
        let mut stats = shared.lock();
        if stats.running {
            return Err(L3Error::Busy(
                "another route injector run is in progress".to_string(),
            ));
        }
        let prefixes = load_prefixes(source, count)?;

        stats.running = true;
        stats.mode = match action {
            RouteAction::Delete => InjectorMode::Deleting,
            _ => InjectorMode::Populating,
        };
        stats.updated = 0;
        stats.errors = 0;
        stats.exec_time = Duration::ZERO;
        shared.kickout.store(false, Ordering::SeqCst);
        drop(stats);

        info!(
            "RouteInjector: {} {} routes on VRF {}",
            action,
            prefixes.len(),
            self.manager.vrf_name()
        );
        Ok(InjectorRun {
            manager: Arc::clone(&self.manager),
            shared,
            action,
            prefixes,
            ignore_errors,
        })
    }
}

/// A prepared injector run. Dropping it without calling
/// [`InjectorRun::run`] marks the injector idle again.
#[derive(Debug)]
pub struct InjectorRun {
    manager: Arc<L3Manager>,
    shared: Arc<InjectorShared>,
    action: RouteAction,
    prefixes: Vec<IpPrefix>,
    ignore_errors: bool,
}

impl InjectorRun {
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Runs to completion, until an error (unless ignored) or until stopped.
    pub fn run(self) -> InjectorStats {
        let shared = Arc::clone(&self.shared);
        self.execute();
        drop(self);
        shared.stats()
    }

    fn execute(&self) {
        let adding = self.action == RouteAction::Add;

        for prefix in &self.prefixes {
            if self.shared.kickout.load(Ordering::SeqCst) {
                info!("RouteInjector: stopped at {}", prefix);
                break;
            }

            let mut req = RouteRequest::new(AddressFamily::Ipv4, prefix.to_string())
                .with_nexthop(NextHopSpec::port("1", NextHopState::Unresolved));
            let started = Instant::now();
            let result = self.manager.route_action(self.action, &mut req);
            let elapsed = started.elapsed();

            if let Err(e) = &result {
                if !self.ignore_errors {
                    error!("RouteInjector: {} {} failed: {}", self.action, prefix, e);
                    break;
                }
                debug!("RouteInjector: {} {} skipped: {}", self.action, prefix, e);
            }

            let mut stats = self.shared.lock();
            stats.exec_time += elapsed;
            match result {
                Ok(()) if adding => {
                    stats.active += 1;
                    stats.updated += 1;
                }
                Ok(()) => {
                    if stats.active > 0 {
                        stats.active -= 1;
                        stats.updated += 1;
                    }
                }
                Err(_) => stats.errors += 1,
            }

            if adding {
                let total = stats.errors + stats.active;
                if total == 10_000 || total == 20_000 || total % 50_000 == 0 {
                    info!(
                        "RouteInjector: total routes ({}), populated routes ({}), skipped routes ({}), execution time ({:.6} seconds)",
                        total,
                        stats.active,
                        stats.errors,
                        stats.exec_time.as_secs_f64()
                    );
                }
            }
        }
    }
}

impl Drop for InjectorRun {
    fn drop(&mut self) {
        self.shared.finish();
        debug!("RouteInjector: {} run finished", self.action);
    }
}

/// Expands `source` into at most `count` prefixes.
fn load_prefixes(source: &InjectorSource, count: u32) -> Result<Vec<IpPrefix>> {
    match source {
        InjectorSource::Prefix(start) => {
            let step = start.ipv4_step().ok_or_else(|| {
                L3Error::InvalidAddress(format!(
                    "{}: injector needs an IPv4 prefix longer than /0",
                    start
                ))
            })?;
            let base = start.address().as_ipv4_u32().unwrap_or(0);
            (0..count)
                .map(|i| -> Result<IpPrefix> {
                    let addr = base.wrapping_add(step.wrapping_mul(i));
                    Ok(IpPrefix::from_ipv4_u32(addr, start.prefix_len())?)
                })
                .collect()
        }
        InjectorSource::File(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                L3Error::InvalidArgument(format!("{}: {}", path.display(), e))
            })?;
            parse_route_file(&text, count)
        }
    }
}

/// Parses route file text. Reading stops at `count` routes, at the end of
/// the text, or at the first malformed pair.
fn parse_route_file(text: &str, count: u32) -> Result<Vec<IpPrefix>> {
    let mut tokens = text.split_whitespace();
    tokens
        .next()
        .and_then(|t| t.parse::<u32>().ok())
        .ok_or_else(|| L3Error::InvalidArgument("route file does not start with a route count".to_string()))?;

    let mut prefixes = Vec::new();
    while prefixes.len() < count as usize {
        let (Some(mask), Some(addr)) = (tokens.next(), tokens.next()) else {
            break;
        };
        let addr = addr.trim_start_matches("0x").trim_start_matches("0X");
        let (Ok(mask), Ok(addr)) = (mask.parse::<u8>(), u32::from_str_radix(addr, 16)) else {
            break;
        };
        prefixes.push(IpPrefix::from_ipv4_u32(addr, mask)?);
    }
    Ok(prefixes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prefix_source_steps_by_prefix_size() {
        let start: IpPrefix = "10.0.0.0/24".parse().unwrap();
        let prefixes = load_prefixes(&InjectorSource::Prefix(start), 3).unwrap();
        let text: Vec<String> = prefixes.iter().map(|p| p.to_string()).collect();
        assert_eq!(text, vec!["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/24"]);
    }

    #[test]
    fn test_prefix_source_rejects_ipv6() {
        let start: IpPrefix = "2001:db8::/64".parse().unwrap();
        assert!(load_prefixes(&InjectorSource::Prefix(start), 1).is_err());
    }

    #[test]
    fn test_route_file() {
        let prefixes = parse_route_file("3\n24 0a000000\n16 0xac100000\n32 c0a80101\n", 2).unwrap();
        let text: Vec<String> = prefixes.iter().map(|p| p.to_string()).collect();
        assert_eq!(text, vec!["10.0.0.0/24", "172.16.0.0/16"]);

        let prefixes = parse_route_file("5 24 0a000000 bogus", 10).unwrap();
        assert_eq!(prefixes.len(), 1);

        assert!(parse_route_file("", 1).is_err());
        assert!(parse_route_file("2 40 0a000000", 1).is_err());
    }
}
