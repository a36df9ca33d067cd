//! Session discovery: projects agent beads into reachable [`Session`]
//! records, health-checks them through a bounded worker pool, and owns
//! the event-sourced create/destroy lifecycle for agent beads.

pub mod error;
pub mod health;
pub mod lifecycle;
pub mod session;

pub use error::{RegistryError, Result};
pub use health::{check_all, DEFAULT_TIMEOUT, DEFAULT_WORKERS};
pub use lifecycle::{create_session, destroy_session};
pub use session::{derive_session_id, Session};

use std::sync::Arc;

use gastown_backend::Backend;
use gastown_core::store::{BeadFilter, IssueStore};

/// List every agent bead the store holds, project each into a [`Session`],
/// and health-check the result with the default worker pool and timeout.
pub async fn discover(store: &dyn IssueStore, backend: &Arc<dyn Backend>) -> Result<Vec<Session>> {
    let beads = store
        .list(&BeadFilter {
            bead_type: Some("agent".to_string()),
            ..BeadFilter::default()
        })
        .await?;

    let sessions: Vec<Session> = beads.iter().filter_map(Session::from_bead).collect();
    Ok(health::check_all(backend, sessions, DEFAULT_WORKERS, DEFAULT_TIMEOUT).await)
}
