//! The `Session` record: what the registry projects from an agent bead.

use gastown_backend::BackendKind;
use gastown_core::config::ExecutionTarget;
use gastown_core::{AgentState, Bead, RoleType};

/// A resolved, reachable agent, as projected from one agent bead.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub bead_id: String,
    pub rig: String,
    pub role: RoleType,
    pub name: String,
    pub session_id: String,
    pub backend_kind: BackendKind,
    pub remote_url: Option<String>,
    pub target: ExecutionTarget,
    pub agent_state: AgentState,
    pub hook_bead: Option<String>,
    /// Populated only after a health check has run; `None` means unknown.
    pub alive: Option<bool>,
}

impl Session {
    /// Project a `Session` from an agent bead. Returns `None` for beads
    /// that are not agent records (missing `role_type` or `agent_state`).
    #[must_use]
    pub fn from_bead(bead: &Bead) -> Option<Self> {
        let role = bead.role_type?;
        let agent_state = bead.agent_state?;
        let rig = bead.rig.clone().unwrap_or_default();
        let notes = gastown_core::fields::parse_discovery_notes(&bead.description);
        let has_k8s_label = bead.has_label("execution_target:k8s");

        let (backend_kind, remote_url, target) = match &notes.backend {
            Some(kind) if kind == "remote" => {
                (BackendKind::RemoteAgent, notes.coop_url.clone(), ExecutionTarget::K8s)
            }
            Some(kind) if kind == "remote_exec" => {
                (BackendKind::RemoteExec, notes.coop_url.clone(), ExecutionTarget::Local)
            }
            Some(_) | None if has_k8s_label => (BackendKind::RemoteAgent, notes.coop_url.clone(), ExecutionTarget::K8s),
            _ => (BackendKind::LocalMultiplexer, None, ExecutionTarget::Local),
        };

        let name = bead.metadata_get("name").unwrap_or(&bead.id).to_string();
        let session_id = derive_session_id(&bead.id, role, &rig, &name);

        Some(Self {
            bead_id: bead.id.clone(),
            rig,
            role,
            name,
            session_id,
            backend_kind,
            remote_url,
            target,
            agent_state,
            hook_bead: bead.hook_bead.clone(),
            alive: None,
        })
    }
}

/// Session-name derivation is a pure function of bead ID: town-level roles
/// keep their bead ID verbatim; rig-level roles get `gt-<rig>-<role>[-<name>]`.
#[must_use]
pub fn derive_session_id(bead_id: &str, role: RoleType, rig: &str, name: &str) -> String {
    if role.is_town_level() {
        return bead_id.to_string();
    }
    if name == bead_id || name.is_empty() {
        format!("gt-{rig}-{role}")
    } else {
        format!("gt-{rig}-{role}-{name}")
    }
}
