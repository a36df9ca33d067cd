//! The registry-refresh loop: periodically re-derives every session from
//! the store and health-checks it through a bounded worker pool sized
//! from town settings.

use std::sync::Arc;
use std::time::Duration;

use gastown_backend::Backend;
use gastown_core::store::{BeadFilter, IssueStore};
use gastown_registry::{health, Session};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(15);

pub fn spawn(
    store: Arc<dyn IssueStore>,
    backend: Arc<dyn Backend>,
    health_check_workers: usize,
    health_check_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("registry refresh loop stopping");
                    break;
                }
                () = tokio::time::sleep(REFRESH_INTERVAL) => {
                    match refresh(&store, &backend, health_check_workers, health_check_timeout).await {
                        Ok(sessions) => tracing::debug!(count = sessions.len(), "registry refreshed"),
                        Err(err) => tracing::warn!(error = %err, "registry refresh failed"),
                    }
                }
            }
        }
    })
}

async fn refresh(
    store: &Arc<dyn IssueStore>,
    backend: &Arc<dyn Backend>,
    workers: usize,
    timeout: Duration,
) -> gastown_registry::Result<Vec<Session>> {
    let beads = store.list(&BeadFilter { bead_type: Some("agent".to_string()), ..BeadFilter::default() }).await?;
    let sessions: Vec<Session> = beads.iter().filter_map(Session::from_bead).collect();
    Ok(health::check_all(backend, sessions, workers, timeout).await)
}
