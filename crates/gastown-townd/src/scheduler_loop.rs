//! One scheduler loop per active rig: ticks the merge-queue scheduler on
//! an interval until told to stop.

use std::time::Duration;

use gastown_core::rig::RigPaths;
use gastown_queue::Scheduler;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How often an idle rig's scheduler re-checks the queue.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

pub fn spawn(
    scheduler: Scheduler,
    weights: gastown_core::config::QueueWeights,
    rig_paths: RigPaths,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut previous = None;
        let heartbeat_path = rig_paths.heartbeat_path();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!(rig = rig_paths.name(), "scheduler loop stopping");
                    break;
                }
                result = scheduler.tick(&weights, previous.as_ref(), &heartbeat_path) => {
                    match result {
                        Ok(heartbeat) => previous = Some(heartbeat),
                        Err(err) => tracing::warn!(rig = rig_paths.name(), error = %err, "scheduler tick failed"),
                    }
                    tokio::time::sleep(TICK_INTERVAL).await;
                }
            }
        }
    })
}
