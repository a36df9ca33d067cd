//! The branch node: one vertex of the branch DAG.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a branch node. `Merged` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeStatus {
    Clean,
    NeedsRebase,
    Conflict,
    Merged,
    Closed,
}

impl NodeStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Merged | Self::Closed)
    }
}

/// One branch in the DAG. `parent: None` means this branch's parent is
/// the rig's (or town's) root branch, which is not itself a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchNode {
    pub name: String,
    pub parent: Option<String>,
    pub status: NodeStatus,
    pub head_sha: String,
    pub base_sha: String,
    pub epic: Option<String>,
    pub subtask: Option<String>,
    pub worker: Option<String>,
    pub conflict_files: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl BranchNode {
    #[must_use]
    pub fn new(name: impl Into<String>, parent: Option<String>, head_sha: impl Into<String>) -> Self {
        let head_sha = head_sha.into();
        Self {
            name: name.into(),
            parent,
            status: NodeStatus::Clean,
            head_sha: head_sha.clone(),
            base_sha: head_sha,
            epic: None,
            subtask: None,
            worker: None,
            conflict_files: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}
