//! Event-sourced session lifecycle: the agent bead itself is the signal.
//! There is no separate process table; creating or destroying a session
//! means writing the bead state an agent watches to spawn or stop.

use std::collections::BTreeMap;

use gastown_core::bead::{AgentState, Bead, RoleType};
use gastown_core::store::IssueStore;

use crate::error::Result;

/// Create or reopen the agent bead for `(rig, role, name)`, setting
/// `agent_state=spawning`. When `k8s` is true the bead is labeled
/// `execution_target:k8s` so discovery resolves it to the remote backend
/// without a local worktree or multiplexer session ever being created.
pub async fn create_session(
    store: &dyn IssueStore,
    id: &str,
    rig: &str,
    role: RoleType,
    name: &str,
    k8s: bool,
) -> Result<Bead> {
    let mut fields = BTreeMap::new();
    fields.insert("rig".to_string(), rig.to_string());
    fields.insert("role_type".to_string(), role.to_string());
    fields.insert("name".to_string(), name.to_string());
    fields.insert("agent_state".to_string(), AgentState::Spawning.to_string());

    let title = format!("{role} {name}");
    let bead = store.create_or_reopen_agent(id, &title, &fields).await?;

    if k8s {
        store.add_label(id, "execution_target:k8s").await?;
    }

    Ok(bead)
}

/// Close the agent bead. The registry does not tear down the underlying
/// session itself; that is a worker/backend concern reacting to the
/// closed bead.
pub async fn destroy_session(store: &dyn IssueStore, id: &str, reason: &str) -> Result<()> {
    store.close_with_reason(id, reason).await?;
    Ok(())
}
