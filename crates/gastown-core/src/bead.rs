//! The bead and agent-record types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Status of a bead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BeadStatus {
    Open,
    InProgress,
    Hooked,
    Pinned,
    Closed,
}

impl BeadStatus {
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    #[must_use]
    pub const fn is_hooked_or_pinned(self) -> bool {
        matches!(self, Self::Hooked | Self::Pinned)
    }
}

/// Role of an agent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoleType {
    Mayor,
    Deacon,
    Witness,
    Refinery,
    Polecat,
    Crew,
    Dog,
}

impl RoleType {
    /// Town-level roles keep their bead ID as their session name; rig-level
    /// roles are scoped to a rig directory.
    #[must_use]
    pub const fn is_town_level(self) -> bool {
        matches!(self, Self::Mayor | Self::Deacon)
    }
}

/// Lifecycle state of an agent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentState {
    Spawning,
    Working,
    Done,
    Stuck,
    Exited,
    Crashed,
}

/// A close reason, recorded as a free-text string: a status close always
/// carries one; `merged`/`rejected` are conventional prefixes observers
/// parse but the store itself treats the whole thing as opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason(pub String);

impl CloseReason {
    #[must_use]
    pub fn merged() -> Self {
        Self("merged".to_string())
    }

    #[must_use]
    pub fn rejected(why: impl Into<String>) -> Self {
        Self(format!("rejected: {}", why.into()))
    }

    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.0 == "merged"
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.0.starts_with("rejected:")
    }
}

/// A label on a bead. Labels may repeat kinds, so this is a plain ordered
/// list, not a set; readers that need set semantics (delivery-label
/// parsing) do their own dedup.
pub type Labels = Vec<String>;

/// The atomic unit of work/record in the issue store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bead {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: BeadStatus,
    /// 0 = highest priority.
    pub priority: u8,
    pub assignee: Option<String>,
    pub bead_type: String,
    pub labels: Labels,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub close_reason: Option<CloseReason>,

    /// Present only on agent records: the bead this agent is currently
    /// pinned to.
    pub hook_bead: Option<String>,
    /// Present only on agent records.
    pub role_type: Option<RoleType>,
    /// Present only on agent records; empty string means town-level.
    pub rig: Option<String>,
    /// Present only on agent records.
    pub agent_state: Option<AgentState>,
    /// Present only on merge-request beads.
    pub convoy_id: Option<String>,
}

impl Bead {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, bead_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: BeadStatus::Open,
            priority: 2,
            assignee: None,
            bead_type: bead_type.into(),
            labels: Vec::new(),
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
            close_reason: None,
            hook_bead: None,
            role_type: None,
            rig: None,
            agent_state: None,
            convoy_id: None,
        }
    }

    /// Validates the "at most one agent may have status = hooked against
    /// any given bead" invariant can be checked locally before a would-be
    /// hooker proceeds. The real serialization happens in the store's
    /// read-modify-write transaction; this is the pre-check dispatch
    /// performs before attempting the hook.
    pub fn ensure_hookable(&self, force: bool) -> Result<()> {
        if self.status.is_closed() {
            return Err(Error::BeadClosed(self.id.clone()));
        }
        if self.status.is_hooked_or_pinned() && !force {
            let hooked_to = self.assignee.clone().unwrap_or_default();
            return Err(Error::BeadAlreadyHooked {
                bead: self.id.clone(),
                hooked_to,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    #[must_use]
    pub fn metadata_get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}
