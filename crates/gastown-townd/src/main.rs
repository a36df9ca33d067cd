//! The Gas Town daemon: hosts a dispatch-request handler, one scheduler
//! loop per active rig, and a registry-refresh loop in a single process.
//! Workers themselves run out-of-process; this binary never spawns an
//! agent's own work loop, only the town-level coordination around it.

mod dispatch_handler;
mod registry_loop;
mod rigs;
mod scheduler_loop;
mod shutdown;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use gastown_backend::{Backend, LocalMultiplexer};
use gastown_core::config::{load_rig_settings, load_town_settings, RigSettings};
use gastown_core::rig::TownRoot;
use gastown_core::store::{BdIssueStore, IssueStore};
use gastown_dag::{DagStore, NullSignaler};
use gastown_dispatch::{IdentityFormulaEngine, LoggingMailer};
use gastown_queue::Scheduler;
use tokio::sync::watch;

/// How long the dispatch handler is given to drain its queue after the
/// channel closes before the process gives up waiting on it.
const DISPATCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "gastown-townd", about = "Gas Town's town-level coordination process")]
struct Cli {
    /// Town root to operate on. Defaults to walking up from the current
    /// directory looking for `.beads/`.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Multiplexer program the local backend shells out to.
    #[arg(long, default_value = "tmux")]
    multiplexer: String,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&cli.log_level))
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir()?;
    let town = TownRoot::resolve(cli.root.as_deref().unwrap_or(&cwd))?;
    let town_settings = load_town_settings(&town)?;

    let store: Arc<dyn IssueStore> = Arc::new(BdIssueStore::new(town.path().join(".beads")));
    let backend: Arc<dyn Backend> = Arc::new(LocalMultiplexer::new(cli.multiplexer));

    let rig_names = rigs::discover_active_rigs(town.path());
    tracing::info!(town = %town.path().display(), rigs = rig_names.len(), "town process starting");

    let mut raw_rig_settings = HashMap::new();
    let mut schedulers = Vec::new();
    for name in &rig_names {
        let rig_paths = town.rig(name);
        let rig_settings = load_rig_settings(&rig_paths).unwrap_or_else(|err| {
            tracing::warn!(rig = %name, error = %err, "failed to load rig settings, using defaults");
            RigSettings::default()
        });
        let effective = town_settings.effective_for_rig(&rig_settings);
        let weights = effective.queue_weights;
        let dag = DagStore::load(rig_paths.dag_path()).await?;
        let scheduler = Scheduler::new(
            Arc::clone(&store),
            name.clone(),
            effective,
            None,
            "none",
            town.path().to_path_buf(),
            dag,
            Arc::new(NullSignaler),
        );
        schedulers.push((scheduler, weights, rig_paths));
        raw_rig_settings.insert(name.clone(), rig_settings);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let registry_task = registry_loop::spawn(
        Arc::clone(&store),
        Arc::clone(&backend),
        town_settings.health_check_workers,
        Duration::from_secs(town_settings.health_check_timeout_secs),
        shutdown_rx.clone(),
    );

    let scheduler_tasks: Vec<_> = schedulers
        .into_iter()
        .map(|(scheduler, weights, rig_paths)| scheduler_loop::spawn(scheduler, weights, rig_paths, shutdown_rx.clone()))
        .collect();

    let (dispatch_handle, dispatch_task) = dispatch_handler::spawn(
        Arc::clone(&store),
        Arc::clone(&backend),
        Arc::new(IdentityFormulaEngine),
        Arc::new(LoggingMailer),
        town.path().to_path_buf(),
        Arc::new(raw_rig_settings),
    );
    // Dispatch requests arrive through `dispatch_handle` from whatever
    // external transport a caller wires in; this process only owns the
    // queue and its single consuming loop.

    shutdown::wait_for_shutdown_signal().await;
    tracing::info!("shutdown requested, draining in-flight work");

    shutdown_tx.send(true).ok();
    drop(dispatch_handle);

    if tokio::time::timeout(DISPATCH_DRAIN_TIMEOUT, dispatch_task).await.is_err() {
        tracing::warn!("dispatch handler did not drain within the timeout");
    }
    for task in scheduler_tasks {
        task.await.ok();
    }
    registry_task.await.ok();

    tracing::info!("town process stopped");
    Ok(())
}
