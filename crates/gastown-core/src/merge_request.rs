//! Merge requests: beads of type `merge-request`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bead::CloseReason;

/// Lifecycle status of one merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MrStatus {
    Open,
    InProgress,
    Merged,
    Rejected,
}

/// A bead of type `merge-request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    pub bead_id: String,
    pub source_branch: String,
    pub worker: String,
    pub source_issue: String,
    pub target_branch: String,
    pub status: MrStatus,
    pub retry_count: u32,
    pub convoy_id: Option<String>,
    pub convoy_created_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Non-empty only when `status == Open` and a prior attempt failed;
    /// the retry contract requires this to be clear before a retry is
    /// valid.
    pub error: String,
    pub close_reason: Option<CloseReason>,
}

impl MergeRequest {
    #[must_use]
    pub fn new(
        bead_id: impl Into<String>,
        source_branch: impl Into<String>,
        worker: impl Into<String>,
        source_issue: impl Into<String>,
        target_branch: impl Into<String>,
    ) -> Self {
        Self {
            bead_id: bead_id.into(),
            source_branch: source_branch.into(),
            worker: worker.into(),
            source_issue: source_issue.into(),
            target_branch: target_branch.into(),
            status: MrStatus::Open,
            retry_count: 0,
            convoy_id: None,
            convoy_created_at: None,
            created_at: Utc::now(),
            error: String::new(),
            close_reason: None,
        }
    }

    /// `retry(id)` is valid only on an MR with status `open` AND a
    /// non-empty error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.status == MrStatus::Open && !self.error.is_empty()
    }

    /// Age of the MR in hours, a merge-queue scoring input.
    #[must_use]
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds().max(0) as f64 / 3600.0
    }

    /// `conflict-retry`: returns the MR to `open`, bumps `retry_count`,
    /// and clears `error` so a human or the refinery agent rechecks later.
    pub fn conflict_retry(&mut self) {
        self.status = MrStatus::Open;
        self.retry_count += 1;
        self.error.clear();
    }

    /// Idempotent retry: clears `error` without touching `retry_count`.
    /// The retry penalty is additive across cycles, but the retry action
    /// itself is idempotent.
    pub fn retry(&mut self) {
        self.error.clear();
    }

    pub fn reject(&mut self, why: impl Into<String>) {
        self.status = MrStatus::Rejected;
        self.close_reason = Some(CloseReason::rejected(why));
    }

    pub fn mark_merged(&mut self) {
        self.status = MrStatus::Merged;
        self.close_reason = Some(CloseReason::merged());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_requires_open_and_nonempty_error() {
        let mut mr = MergeRequest::new("gt-mr-1", "a", "worker", "gt-1", "main");
        assert!(!mr.is_retryable());
        mr.error = "conflict".into();
        assert!(mr.is_retryable());
        mr.status = MrStatus::Merged;
        assert!(!mr.is_retryable());
    }

    #[test]
    fn retry_clears_error_without_bumping_count() {
        let mut mr = MergeRequest::new("gt-mr-1", "a", "worker", "gt-1", "main");
        mr.error = "conflict".into();
        mr.retry();
        assert_eq!(mr.retry_count, 0);
        assert!(mr.error.is_empty());
    }

    #[test]
    fn conflict_retry_bumps_count_and_reopens() {
        let mut mr = MergeRequest::new("gt-mr-1", "a", "worker", "gt-1", "main");
        mr.status = MrStatus::InProgress;
        mr.conflict_retry();
        assert_eq!(mr.retry_count, 1);
        assert_eq!(mr.status, MrStatus::Open);
        assert!(mr.error.is_empty());
    }
}
