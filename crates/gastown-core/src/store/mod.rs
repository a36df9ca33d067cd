//! The issue/bead store contract. This is consumed, not defined:
//! production code talks to the `bd` binary ([`bd::BdIssueStore`]); tests
//! use [`memory::InMemoryIssueStore`].

mod bd;
mod memory;

pub use bd::BdIssueStore;
pub use memory::InMemoryIssueStore;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::bead::{Bead, BeadStatus};
use crate::error::Result;

/// Read timeout for bead reads.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
/// Write timeout for bead writes.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(60);

/// Filters accepted by [`IssueStore::list`].
#[derive(Debug, Clone, Default)]
pub struct BeadFilter {
    pub status: Option<BeadStatus>,
    pub bead_type: Option<String>,
    pub rig: Option<String>,
    pub label: Option<String>,
    /// Match a `field=value` pair against a bead's metadata, used by
    /// `find_mr_for_branch`.
    pub field: Option<(String, String)>,
}

/// Fields an [`IssueStore::update`] call may change.
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    pub status: Option<BeadStatus>,
    pub assignee: Option<String>,
}

/// Outcome of a merge-slot acquisition attempt: a rig's refinery holds a
/// single global merge slot, and conflicting holders are deferred rather
/// than queued in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSlotStatus {
    pub available: bool,
    pub holder: Option<String>,
}

/// The narrow interface the core composes the issue-tracker binary
/// through.
#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn list(&self, filters: &BeadFilter) -> Result<Vec<Bead>>;
    async fn show(&self, id: &str) -> Result<Bead>;
    async fn create_or_reopen_agent(
        &self,
        id: &str,
        title: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Bead>;
    async fn close_with_reason(&self, id: &str, reason: &str) -> Result<()>;
    async fn add_label(&self, id: &str, label: &str) -> Result<()>;
    async fn set_hook_bead(&self, id: &str, bead: &str) -> Result<()>;
    async fn update(&self, id: &str, fields: &UpdateFields) -> Result<()>;
    async fn create_mr_fields(
        &self,
        branch: &str,
        worker: &str,
        source: &str,
        target: &str,
    ) -> Result<Bead>;
    async fn find_mr_for_branch(&self, branch: &str) -> Result<Option<Bead>>;
    async fn merge_slot_acquire(&self, holder: &str, add_waiter: bool) -> Result<MergeSlotStatus>;
    async fn merge_slot_release(&self, holder: &str) -> Result<()>;
}
