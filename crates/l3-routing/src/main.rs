//! l3routed entry point.
//!
//! Builds one L3 manager per configured VRF on a simulated forwarding
//! backend, replays recorded control-plane commands, and optionally runs
//! the bulk route injector.

use anyhow::Context;
use clap::Parser;
use l3_hw::SimBackend;
use l3_routing::{
    show_injector, show_summary, DaemonConfig, InjectorSource, InjectorStats, L3Command,
    L3Manager, L3Snapshot, VrfRegistry,
};
use l3_types::IpPrefix;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// L3 forwarding resource manager daemon
#[derive(Parser, Debug)]
#[command(name = "l3routed")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// JSON file with a list of commands to replay
    #[arg(short = 'r', long)]
    replay: Option<PathBuf>,

    /// First prefix (or route file) for the route injector
    #[arg(long)]
    selftest_prefix: Option<String>,

    /// Number of routes the injector adds
    #[arg(long, default_value = "1")]
    selftest_count: u32,

    /// Keep injecting after a failed route
    #[arg(long)]
    selftest_ignore_errors: bool,

    /// VRF the injector runs against
    #[arg(long, default_value = "vrf_default")]
    selftest_vrf: String,

    /// Print the route, host and next-hop tables before exiting
    #[arg(long)]
    show: bool,

    /// Print a JSON snapshot of every VRF before exiting
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("Starting l3routed");

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("l3routed failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when some replayed command or the injector failed.
async fn run(args: Args) -> anyhow::Result<bool> {
    let config = match &args.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };

    let backend = Arc::new(SimBackend::new(config.backend.clone()));
    let registry = VrfRegistry::new();
    for vrf in &config.vrfs {
        registry.register(L3Manager::create(backend.clone(), vrf.clone()))?;
    }
    info!("Registered VRFs: {}", registry.names().join(", "));

    let mut ok = true;

    if let Some(path) = &args.replay {
        ok &= replay(&registry, path)?;
    }

    let mut injector_report = None;
    if let Some(start) = &args.selftest_prefix {
        let manager = registry
            .lookup(&args.selftest_vrf)
            .with_context(|| format!("unknown VRF {}", args.selftest_vrf))?;
        let (stats, complete) = run_injector(manager, start, &args).await?;
        ok &= complete;
        injector_report = Some(stats);
    }

    if args.show {
        println!("{}", show_summary(&registry));
        for manager in registry.managers() {
            println!("VRF {}", manager.vrf_name());
            println!("{}", manager.show_routes());
            println!("{}", manager.show_hosts());
            println!("{}", manager.show_nexthops());
        }
        if let Some(stats) = &injector_report {
            println!("{}", show_injector(stats));
        }
    }

    if args.json {
        let snapshots: Vec<L3Snapshot> = registry.managers().iter().map(|m| m.snapshot()).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshots).context("failed to serialize snapshot")?
        );
    }

    registry.destroy_all();
    info!("l3routed stopped");
    Ok(ok)
}

fn replay(registry: &VrfRegistry, path: &Path) -> anyhow::Result<bool> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let commands: Vec<L3Command> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    info!("Replaying {} commands from {}", commands.len(), path.display());
    let mut failed = 0;
    for (i, command) in commands.iter().enumerate() {
        match command.apply(registry) {
            Ok(output) => info!("command {}: {:?}", i, output),
            Err(e) => {
                warn!("command {} failed (errno {}): {}", i, e.errno(), e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        warn!("{} of {} commands failed", failed, commands.len());
    }
    Ok(failed == 0)
}

/// Runs the injector on a blocking thread; Ctrl-C stops it between routes.
///
/// The flag is false when the run ended before trying every route.
async fn run_injector(
    manager: Arc<L3Manager>,
    start: &str,
    args: &Args,
) -> anyhow::Result<(InjectorStats, bool)> {
    let source = match start.parse::<IpPrefix>() {
        Ok(prefix) => InjectorSource::Prefix(prefix),
        Err(_) => InjectorSource::File(PathBuf::from(start)),
    };

    let injector = manager.injector();
    let job = injector.start_add(&source, args.selftest_count, args.selftest_ignore_errors)?;
    let planned = job.len() as u64;
    info!(
        "Route injector populating {} routes on VRF {}",
        planned,
        manager.vrf_name()
    );

    let mut handle = tokio::task::spawn_blocking(move || job.run());
    let stats = tokio::select! {
        joined = &mut handle => joined.context("route injector task panicked")?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping route injector");
            injector.stop();
            handle.await.context("route injector task panicked")?
        }
    };

    info!(
        "Route injector done: {} populated, {} skipped, {:.6}s",
        stats.updated,
        stats.errors,
        stats.exec_time.as_secs_f64()
    );
    let complete = stats.updated + stats.errors == planned;
    Ok((stats, complete))
}
