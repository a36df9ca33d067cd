//! Convoys: groups of beads that must merge together.
//!
//! Dispatch-metadata "convoy" and merge-queue-scoring "convoy" are the
//! same aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a convoy's members are merged relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MergeStrategy {
    /// Every member must merge or none do.
    AllOrNothing,
    /// Members merge independently as each becomes ready.
    Independent,
}

/// A group of related beads that must merge together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Convoy {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub members: Vec<String>,
    /// True when dispatch created this convoy implicitly (an auto-convoy)
    /// rather than the caller naming one explicitly with `--convoy`.
    pub owner: bool,
    pub merge_strategy: MergeStrategy,
}

impl Convoy {
    #[must_use]
    pub fn new(id: impl Into<String>, owner: bool) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            members: Vec::new(),
            owner,
            merge_strategy: MergeStrategy::Independent,
        }
    }

    pub fn add_member(&mut self, bead_id: impl Into<String>) {
        let bead_id = bead_id.into();
        if !self.members.contains(&bead_id) {
            self.members.push(bead_id);
        }
    }

    /// Age of the convoy in hours, used as a merge-queue anti-starvation
    /// scoring input.
    #[must_use]
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds().max(0) as f64 / 3600.0
    }
}
