//! An in-process [`IssueStore`] double, used by the other crates' test
//! suites so they don't need a real `bd` binary on `PATH`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::bead::{Bead, BeadStatus};
use crate::error::{Error, Result};

use super::{BeadFilter, IssueStore, MergeSlotStatus, UpdateFields};

#[derive(Debug, Default)]
struct State {
    beads: BTreeMap<String, Bead>,
    merge_slot_holder: Option<String>,
    next_id: u64,
}

/// An in-memory [`IssueStore`]. Cloning shares the underlying state.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIssueStore {
    state: std::sync::Arc<Mutex<State>>,
}

impl InMemoryIssueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a bead, bypassing the create path. Useful for
    /// test setup that needs a specific initial state.
    pub async fn seed(&self, bead: Bead) {
        self.state.lock().await.beads.insert(bead.id.clone(), bead);
    }

    async fn next_bead_id(&self) -> String {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        format!("gt-mem-{}", state.next_id)
    }
}

#[async_trait]
impl IssueStore for InMemoryIssueStore {
    async fn list(&self, filters: &BeadFilter) -> Result<Vec<Bead>> {
        let state = self.state.lock().await;
        Ok(state
            .beads
            .values()
            .filter(|b| filters.status.is_none_or(|s| b.status == s))
            .filter(|b| filters.bead_type.as_deref().is_none_or(|t| b.bead_type == t))
            .filter(|b| filters.rig.as_deref().is_none_or(|r| b.rig.as_deref() == Some(r)))
            .filter(|b| filters.label.as_deref().is_none_or(|l| b.has_label(l)))
            .filter(|b| {
                filters
                    .field
                    .as_ref()
                    .is_none_or(|(k, v)| b.metadata_get(k) == Some(v.as_str()))
            })
            .cloned()
            .collect())
    }

    async fn show(&self, id: &str) -> Result<Bead> {
        self.state
            .lock()
            .await
            .beads
            .get(id)
            .cloned()
            .ok_or_else(|| Error::BeadNotFound(id.to_string()))
    }

    async fn create_or_reopen_agent(
        &self,
        id: &str,
        title: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Bead> {
        let mut state = self.state.lock().await;
        let bead = state.beads.entry(id.to_string()).or_insert_with(|| Bead::new(id, title, "agent"));
        bead.status = BeadStatus::Open;
        bead.close_reason = None;
        for (key, value) in fields {
            match key.as_str() {
                "rig" => bead.rig = Some(value.clone()),
                "role_type" => bead.role_type = value.parse().ok(),
                "agent_state" => bead.agent_state = value.parse().ok(),
                _ => {
                    bead.metadata.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(bead.clone())
    }

    async fn close_with_reason(&self, id: &str, reason: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let bead = state.beads.get_mut(id).ok_or_else(|| Error::BeadNotFound(id.to_string()))?;
        bead.status = BeadStatus::Closed;
        bead.close_reason = Some(crate::bead::CloseReason(reason.to_string()));
        Ok(())
    }

    async fn add_label(&self, id: &str, label: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let bead = state.beads.get_mut(id).ok_or_else(|| Error::BeadNotFound(id.to_string()))?;
        if !bead.has_label(label) {
            bead.labels.push(label.to_string());
        }
        Ok(())
    }

    async fn set_hook_bead(&self, id: &str, bead: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let record = state.beads.get_mut(id).ok_or_else(|| Error::BeadNotFound(id.to_string()))?;
        record.hook_bead = Some(bead.to_string());
        Ok(())
    }

    async fn update(&self, id: &str, fields: &UpdateFields) -> Result<()> {
        let mut state = self.state.lock().await;
        let bead = state.beads.get_mut(id).ok_or_else(|| Error::BeadNotFound(id.to_string()))?;
        if let Some(status) = fields.status {
            bead.status = status;
        }
        if let Some(assignee) = &fields.assignee {
            bead.assignee = Some(assignee.clone());
        }
        Ok(())
    }

    async fn create_mr_fields(
        &self,
        branch: &str,
        worker: &str,
        source: &str,
        target: &str,
    ) -> Result<Bead> {
        let id = self.next_bead_id().await;
        let mut bead = Bead::new(&id, format!("merge request for {branch}"), "merge-request");
        bead.metadata.insert("branch".to_string(), branch.to_string());
        bead.metadata.insert("worker".to_string(), worker.to_string());
        bead.metadata.insert("source".to_string(), source.to_string());
        bead.metadata.insert("target".to_string(), target.to_string());
        self.state.lock().await.beads.insert(id, bead.clone());
        Ok(bead)
    }

    async fn find_mr_for_branch(&self, branch: &str) -> Result<Option<Bead>> {
        let state = self.state.lock().await;
        Ok(state
            .beads
            .values()
            .find(|b| b.bead_type == "merge-request" && b.metadata_get("branch") == Some(branch))
            .cloned())
    }

    async fn merge_slot_acquire(&self, holder: &str, _add_waiter: bool) -> Result<MergeSlotStatus> {
        let mut state = self.state.lock().await;
        match &state.merge_slot_holder {
            Some(current) if current != holder => Ok(MergeSlotStatus {
                available: false,
                holder: Some(current.clone()),
            }),
            _ => {
                state.merge_slot_holder = Some(holder.to_string());
                Ok(MergeSlotStatus {
                    available: true,
                    holder: Some(holder.to_string()),
                })
            }
        }
    }

    async fn merge_slot_release(&self, holder: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.merge_slot_holder.as_deref() == Some(holder) {
            state.merge_slot_holder = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_or_reopen_is_idempotent() {
        let store = InMemoryIssueStore::new();
        let fields = BTreeMap::from([("rig".to_string(), "rigA".to_string())]);
        let first = store.create_or_reopen_agent("gt-1", "Alpha", &fields).await.unwrap();
        store.close_with_reason("gt-1", "done").await.unwrap();
        let second = store.create_or_reopen_agent("gt-1", "Alpha", &fields).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.status, BeadStatus::Open);
        assert!(second.close_reason.is_none());
    }

    #[tokio::test]
    async fn merge_slot_is_exclusive() {
        let store = InMemoryIssueStore::new();
        let first = store.merge_slot_acquire("rigA", false).await.unwrap();
        assert!(first.available);
        let second = store.merge_slot_acquire("rigB", false).await.unwrap();
        assert!(!second.available);
        store.merge_slot_release("rigA").await.unwrap();
        let third = store.merge_slot_acquire("rigB", false).await.unwrap();
        assert!(third.available);
    }

    #[tokio::test]
    async fn find_mr_for_branch_matches_on_field() {
        let store = InMemoryIssueStore::new();
        store.create_mr_fields("feature/x", "Alpha", "feature/x", "main").await.unwrap();
        let found = store.find_mr_for_branch("feature/x").await.unwrap();
        assert!(found.is_some());
        assert!(store.find_mr_for_branch("feature/y").await.unwrap().is_none());
    }
}
