//! The per-rig merge-queue scheduler: ranks open merge requests, holds
//! the rig's merge slot for at most one MR at a time, and drives it
//! through the verification gate before a protected-branch merge.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use gastown_core::bead::{Bead, BeadStatus, CloseReason};
use gastown_core::config::{EffectiveRigSettings, QueueWeights};
use gastown_core::convoy::Convoy;
use gastown_core::error::Error;
use gastown_core::merge_request::{MergeRequest, MrStatus};
use gastown_core::process::run;
use gastown_core::store::{BeadFilter, IssueStore, UpdateFields};
use gastown_dag::{DagStore, Signaler};

use crate::error::Result;
use crate::heartbeat::Heartbeat;
use crate::scoring;
use crate::verification::{run_gate, GateOutcome, Verifier};

const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// `DagError` is a single-variant passthrough of `gastown_core::Error`;
/// unwrap it so `?` can hand the core error to `QueueError`'s own
/// `#[from]`.
fn dag_err(err: gastown_dag::DagError) -> Error {
    let gastown_dag::DagError::Core(core) = err;
    core
}

/// Project a `MergeRequest` from a merge-request bead's metadata fields,
/// using the same `branch`/`worker`/`source`/`target` keys
/// `IssueStore::create_mr_fields` writes. Mirrors
/// `gastown-registry::Session::from_bead`'s precedence: missing required
/// fields mean this bead isn't (yet) a usable MR record.
#[must_use]
pub fn merge_request_from_bead(bead: &Bead) -> Option<MergeRequest> {
    let source_branch = bead.metadata_get("branch")?.to_string();
    let worker = bead.metadata_get("worker")?.to_string();
    let source_issue = bead.metadata_get("source")?.to_string();
    let target_branch = bead.metadata_get("target")?.to_string();

    let status = match bead.status {
        BeadStatus::Closed => match &bead.close_reason {
            Some(reason) if reason.is_merged() => MrStatus::Merged,
            _ => MrStatus::Rejected,
        },
        BeadStatus::InProgress | BeadStatus::Hooked | BeadStatus::Pinned => MrStatus::InProgress,
        BeadStatus::Open => MrStatus::Open,
    };

    let retry_count = bead.metadata_get("retry_count").and_then(|v| v.parse().ok()).unwrap_or(0);
    let error = bead.metadata_get("error").unwrap_or_default().to_string();
    let convoy_id = bead.convoy_id.clone();
    let convoy_created_at = bead.metadata_get("convoy_created_at").and_then(|v| v.parse().ok());

    Some(MergeRequest {
        bead_id: bead.id.clone(),
        source_branch,
        worker,
        source_issue,
        target_branch,
        status,
        retry_count,
        convoy_id,
        convoy_created_at,
        created_at: bead.created_at,
        error,
        close_reason: bead.close_reason.clone(),
    })
}

/// A transient `Convoy` view good enough for scoring: this queue never
/// owns convoy membership, only the id/creation-time an MR carries.
fn convoy_for(mr: &MergeRequest) -> Option<Convoy> {
    let id = mr.convoy_id.clone()?;
    Some(Convoy {
        id,
        created_at: mr.convoy_created_at.unwrap_or(mr.created_at),
        members: Vec::new(),
        owner: false,
        merge_strategy: gastown_core::convoy::MergeStrategy::Independent,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAction {
    /// No open MR was eligible this cycle.
    Idle,
    /// Another holder already has the rig's merge slot.
    SlotBusy,
    Merged { bead_id: String },
    Rejected { bead_id: String },
    NeedsReview { bead_id: String },
}

impl CycleAction {
    fn describe(&self) -> String {
        match self {
            Self::Idle => "idle".to_string(),
            Self::SlotBusy => "merge slot busy".to_string(),
            Self::Merged { bead_id } => format!("merged {bead_id}"),
            Self::Rejected { bead_id } => format!("rejected {bead_id}"),
            Self::NeedsReview { bead_id } => format!("needs review {bead_id}"),
        }
    }

    #[must_use]
    pub const fn processed(&self) -> bool {
        matches!(self, Self::Merged { .. } | Self::Rejected { .. })
    }
}

pub struct Scheduler {
    store: Arc<dyn IssueStore>,
    rig: String,
    settings: EffectiveRigSettings,
    verifier: Option<Arc<dyn Verifier>>,
    worker_model_family: String,
    repo_root: PathBuf,
    dag: DagStore,
    signaler: Arc<dyn Signaler>,
}

impl Scheduler {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn IssueStore>,
        rig: impl Into<String>,
        settings: EffectiveRigSettings,
        verifier: Option<Arc<dyn Verifier>>,
        worker_model_family: impl Into<String>,
        repo_root: PathBuf,
        dag: DagStore,
        signaler: Arc<dyn Signaler>,
    ) -> Self {
        Self {
            store,
            rig: rig.into(),
            settings,
            verifier,
            worker_model_family: worker_model_family.into(),
            repo_root,
            dag,
            signaler,
        }
    }

    fn is_protected(&self, branch: &str) -> bool {
        self.settings.protected_branches.iter().any(|b| b == branch)
    }

    /// A merge-request branch follows the `{role}/{rig}/{name}` convention
    /// `gastown-worker` mints; merge-request beads carry no `rig` field of
    /// their own, so membership is read off the branch name instead.
    fn belongs_to_rig(&self, mr: &MergeRequest) -> bool {
        mr.source_branch.split('/').nth(1) == Some(self.rig.as_str())
    }

    async fn open_candidates(&self) -> Result<Vec<(MergeRequest, u8)>> {
        let filter = BeadFilter {
            status: Some(BeadStatus::Open),
            bead_type: Some("merge-request".to_string()),
            ..BeadFilter::default()
        };
        let beads = self.store.list(&filter).await?;
        Ok(beads
            .iter()
            .filter_map(|bead| merge_request_from_bead(bead).map(|mr| (mr, bead.priority)))
            .filter(|(mr, _)| self.belongs_to_rig(mr))
            .collect())
    }

    /// Run one scheduling cycle: rank every open MR, acquire the rig's
    /// merge slot for the top-ranked one, and drive it to a terminal or
    /// needs-review outcome. At most one MR is in flight per rig.
    pub async fn run_cycle(&self, weights: &QueueWeights) -> Result<(CycleAction, usize)> {
        let now = Utc::now();
        let candidates = self.open_candidates().await?;
        let queue_len = candidates.len();
        if candidates.is_empty() {
            return Ok((CycleAction::Idle, queue_len));
        }

        let entries: Vec<(MergeRequest, u8, Option<Convoy>)> =
            candidates.into_iter().map(|(mr, priority)| { let convoy = convoy_for(&mr); (mr, priority, convoy) }).collect();
        let ranked = scoring::rank(&entries, weights, now);
        let Some(top) = ranked.first() else {
            return Ok((CycleAction::Idle, queue_len));
        };

        let action = self.advance(top).await?;
        Ok((action, queue_len))
    }

    async fn advance(&self, mr: &MergeRequest) -> Result<CycleAction> {
        let slot = self.store.merge_slot_acquire(&mr.worker, true).await?;
        if !slot.available {
            return Ok(CycleAction::SlotBusy);
        }

        self.store.update(&mr.bead_id, &UpdateFields { status: Some(BeadStatus::InProgress), assignee: Some(mr.worker.clone()) }).await?;

        let protected = self.is_protected(&mr.target_branch);
        let outcome = if protected {
            self.run_protected(mr).await
        } else {
            self.finish_merge(mr).await.map(Some)
        };

        match outcome {
            Ok(Some(action)) => Ok(action),
            Ok(None) => {
                self.store.merge_slot_release(&mr.worker).await?;
                Ok(CycleAction::NeedsReview { bead_id: mr.bead_id.clone() })
            }
            Err(err) => {
                self.store.merge_slot_release(&mr.worker).await?;
                Err(err)
            }
        }
    }

    async fn run_protected(&self, mr: &MergeRequest) -> Result<Option<CycleAction>> {
        let Some(verifier) = self.verifier.as_ref() else {
            return Err(Error::VerificationRequired(mr.bead_id.clone()).into());
        };
        let diff_summary = format!("{} -> {}", mr.source_branch, mr.target_branch);
        let (gate_outcome, _response) =
            run_gate(verifier.as_ref(), &self.worker_model_family, &mr.bead_id, &diff_summary, &self.settings.verification).await?;

        match gate_outcome {
            GateOutcome::Verified => self.finish_merge(mr).await.map(Some),
            GateOutcome::Rejected => self.finish_reject(mr, "verification rejected the change").await.map(Some),
            GateOutcome::NeedsReview => Ok(None),
        }
    }

    async fn finish_merge(&self, mr: &MergeRequest) -> Result<CycleAction> {
        self.merge_into_trunk(mr).await?;
        self.store.close_with_reason(&mr.bead_id, &CloseReason::merged().0).await?;
        self.store.merge_slot_release(&mr.worker).await?;
        Ok(CycleAction::Merged { bead_id: mr.bead_id.clone() })
    }

    /// Performs the git merge the queue exists to drive, then retargets
    /// the branch DAG the way `handle_merged` specifies: the merged
    /// branch's direct children move to its parent and flip to
    /// `needs-rebase`. A source branch with no DAG node (never tracked as
    /// a stacked branch) merges without touching DAG state.
    async fn merge_into_trunk(&self, mr: &MergeRequest) -> Result<()> {
        let checkout = run("git", &["checkout", &mr.target_branch], Some(&self.repo_root), &[], GIT_TIMEOUT).await?;
        if !checkout.success {
            return Err(Error::GitMergeFailed(checkout.stderr).into());
        }
        let merge = run("git", &["merge", "--no-ff", &mr.source_branch], Some(&self.repo_root), &[], GIT_TIMEOUT).await?;
        if !merge.success {
            let _ = run("git", &["merge", "--abort"], Some(&self.repo_root), &[], GIT_TIMEOUT).await;
            return Err(Error::GitMergeFailed(merge.stderr).into());
        }

        let tracked = self.dag.read(|dag| dag.get(&mr.source_branch).is_some()).await;
        if !tracked {
            return Ok(());
        }

        let retargeted = self
            .dag
            .with_write(|dag| {
                let new_parent = dag.get(&mr.source_branch).and_then(|n| n.parent.clone()).unwrap_or_default();
                let children = dag.handle_merged(&mr.source_branch)?;
                Ok(children
                    .into_iter()
                    .filter_map(|child| dag.get(&child).map(|n| (child, n.worker.clone())))
                    .map(|(child, worker)| (child, worker, new_parent.clone()))
                    .collect::<Vec<_>>())
            })
            .await
            .map_err(dag_err)?;

        self.signaler.merged(&mr.worker, &mr.source_branch).await;
        for (child, worker, new_parent) in retargeted {
            if let Some(worker) = worker {
                self.signaler.retargeted(&worker, &child, &mr.source_branch, &new_parent).await;
            }
        }
        Ok(())
    }

    async fn finish_reject(&self, mr: &MergeRequest, why: &str) -> Result<CycleAction> {
        self.store.close_with_reason(&mr.bead_id, &CloseReason::rejected(why).0).await?;
        self.store.merge_slot_release(&mr.worker).await?;
        Ok(CycleAction::Rejected { bead_id: mr.bead_id.clone() })
    }

    /// Reopen an MR after its rebase probe reported a conflict, freeing
    /// the merge slot so the next-ranked MR gets a turn. The exact
    /// `retry_count`/`error` bookkeeping the in-memory `MergeRequest`
    /// tracks has no corresponding write in the issue-store contract
    /// (only `status`/`assignee` are mutable post-creation); callers
    /// that need durable retry counts surface them as bead description
    /// text through the tracker directly.
    pub async fn report_conflict(&self, mr: &MergeRequest) -> Result<()> {
        self.store.update(&mr.bead_id, &UpdateFields { status: Some(BeadStatus::Open), assignee: None }).await?;
        self.store.merge_slot_release(&mr.worker).await?;
        Ok(())
    }

    /// Run one cycle and persist the resulting heartbeat atomically.
    pub async fn tick(&self, weights: &QueueWeights, previous: Option<&Heartbeat>, heartbeat_path: &Path) -> Result<Heartbeat> {
        let (action, queue_len) = self.run_cycle(weights).await?;
        let processed_count = usize::from(action.processed());
        let heartbeat = Heartbeat::next(previous, action.describe(), queue_len, processed_count);
        heartbeat.write(heartbeat_path).await?;
        Ok(heartbeat)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tempfile::tempdir;

    use gastown_core::InMemoryIssueStore;
    use gastown_dag::{NodeStatus, NullSignaler};

    use super::*;
    use crate::verification::{Verdict, VerificationResponse};

    async fn init_repo(path: &Path) {
        run("git", &["init", "--initial-branch=main"], Some(path), &[], GIT_TIMEOUT).await.unwrap();
        run("git", &["commit", "--allow-empty", "-m", "init"], Some(path), &[], GIT_TIMEOUT).await.unwrap();
    }

    /// Branches off `base` (already checked out) and leaves `base`
    /// checked out again afterward.
    async fn branch_from(path: &Path, base: &str, name: &str) {
        run("git", &["checkout", "-b", name, base], Some(path), &[], GIT_TIMEOUT).await.unwrap();
        run("git", &["commit", "--allow-empty", "-m", name], Some(path), &[], GIT_TIMEOUT).await.unwrap();
        run("git", &["checkout", base], Some(path), &[], GIT_TIMEOUT).await.unwrap();
    }

    async fn dag_store(repo: &Path) -> DagStore {
        DagStore::load(repo.join("branch-dag.json")).await.unwrap()
    }

    struct AlwaysPass;

    #[async_trait]
    impl Verifier for AlwaysPass {
        fn model_family(&self) -> &str {
            "gpt"
        }

        async fn verify(&self, _mr_bead_id: &str, _diff_summary: &str) -> Result<VerificationResponse> {
            Ok(VerificationResponse { verdict: Verdict::Pass, confidence: 95, issues: Vec::new(), suggestions: Vec::new(), model_family: "gpt".into() })
        }
    }

    struct AlwaysFail;

    #[async_trait]
    impl Verifier for AlwaysFail {
        fn model_family(&self) -> &str {
            "gpt"
        }

        async fn verify(&self, _mr_bead_id: &str, _diff_summary: &str) -> Result<VerificationResponse> {
            Ok(VerificationResponse { verdict: Verdict::Fail, confidence: 10, issues: vec!["broken".into()], suggestions: Vec::new(), model_family: "gpt".into() })
        }
    }

    async fn seed_mr(store: &InMemoryIssueStore, repo: &Path, worker: &str, target: &str) -> String {
        let branch = format!("polecat/rigA/{worker}");
        branch_from(repo, target, &branch).await;
        let bead = store.create_mr_fields(&branch, worker, "gt-1", target).await.unwrap();
        bead.id
    }

    fn settings(protected: Vec<&str>) -> EffectiveRigSettings {
        EffectiveRigSettings {
            protected_branches: protected.into_iter().map(str::to_string).collect(),
            queue_weights: QueueWeights::default(),
            verification: gastown_core::config::VerificationConfig::default(),
        }
    }

    #[tokio::test]
    async fn unprotected_branch_merges_without_a_verifier() {
        let repo = tempdir().unwrap();
        init_repo(repo.path()).await;
        branch_from(repo.path(), "main", "develop").await;

        let mem = InMemoryIssueStore::new();
        let bead_id = seed_mr(&mem, repo.path(), "Alpha", "develop").await;
        let store: Arc<dyn IssueStore> = Arc::new(mem);

        let dag = dag_store(repo.path()).await;
        let scheduler = Scheduler::new(
            store,
            "rigA",
            settings(vec!["main"]),
            None,
            "claude",
            repo.path().to_path_buf(),
            dag,
            Arc::new(NullSignaler),
        );
        let (action, queue_len) = scheduler.run_cycle(&QueueWeights::default()).await.unwrap();
        assert_eq!(queue_len, 1);
        assert_eq!(action, CycleAction::Merged { bead_id });
    }

    #[tokio::test]
    async fn protected_branch_without_verifier_errors() {
        let repo = tempdir().unwrap();
        init_repo(repo.path()).await;

        let mem = InMemoryIssueStore::new();
        seed_mr(&mem, repo.path(), "Alpha", "main").await;
        let store: Arc<dyn IssueStore> = Arc::new(mem);

        let dag = dag_store(repo.path()).await;
        let scheduler = Scheduler::new(
            store,
            "rigA",
            settings(vec!["main"]),
            None,
            "claude",
            repo.path().to_path_buf(),
            dag,
            Arc::new(NullSignaler),
        );
        let err = scheduler.run_cycle(&QueueWeights::default()).await.unwrap_err();
        assert_eq!(err.kind(), gastown_core::ErrorKind::VerificationRequired);
    }

    #[tokio::test]
    async fn protected_branch_verified_merges() {
        let repo = tempdir().unwrap();
        init_repo(repo.path()).await;

        let mem = InMemoryIssueStore::new();
        let bead_id = seed_mr(&mem, repo.path(), "Alpha", "main").await;
        let store: Arc<dyn IssueStore> = Arc::new(mem);

        let dag = dag_store(repo.path()).await;
        let scheduler = Scheduler::new(
            store,
            "rigA",
            settings(vec!["main"]),
            Some(Arc::new(AlwaysPass)),
            "claude",
            repo.path().to_path_buf(),
            dag,
            Arc::new(NullSignaler),
        );
        let (action, _) = scheduler.run_cycle(&QueueWeights::default()).await.unwrap();
        assert_eq!(action, CycleAction::Merged { bead_id });
    }

    #[tokio::test]
    async fn protected_branch_failed_verification_rejects() {
        let repo = tempdir().unwrap();
        init_repo(repo.path()).await;

        let mem = InMemoryIssueStore::new();
        let bead_id = seed_mr(&mem, repo.path(), "Alpha", "main").await;
        let store: Arc<dyn IssueStore> = Arc::new(mem);

        let dag = dag_store(repo.path()).await;
        let scheduler = Scheduler::new(
            store,
            "rigA",
            settings(vec!["main"]),
            Some(Arc::new(AlwaysFail)),
            "claude",
            repo.path().to_path_buf(),
            dag,
            Arc::new(NullSignaler),
        );
        let (action, _) = scheduler.run_cycle(&QueueWeights::default()).await.unwrap();
        assert_eq!(action, CycleAction::Rejected { bead_id });
    }

    #[tokio::test]
    async fn merging_a_tracked_branch_retargets_its_dag_children() {
        let repo = tempdir().unwrap();
        init_repo(repo.path()).await;
        branch_from(repo.path(), "main", "polecat/rigA/Alpha").await;
        branch_from(repo.path(), "polecat/rigA/Alpha", "polecat/rigA/Beta").await;

        let mem = InMemoryIssueStore::new();
        let bead_id = seed_mr_on_existing_branch(&mem, "polecat/rigA/Alpha", "Alpha", "main").await;
        let store: Arc<dyn IssueStore> = Arc::new(mem);

        let dag = dag_store(repo.path()).await;
        dag.with_write(|dag| dag.add(gastown_dag::BranchNode::new("polecat/rigA/Alpha", None, "sha0"))).await.unwrap();
        dag.with_write(|dag| {
            let mut child = gastown_dag::BranchNode::new("polecat/rigA/Beta", Some("polecat/rigA/Alpha".to_string()), "sha0");
            child.worker = Some("Beta".to_string());
            dag.add(child)
        })
        .await
        .unwrap();

        let scheduler = Scheduler::new(
            store,
            "rigA",
            settings(vec![]),
            None,
            "claude",
            repo.path().to_path_buf(),
            dag.clone(),
            Arc::new(NullSignaler),
        );
        let (action, _) = scheduler.run_cycle(&QueueWeights::default()).await.unwrap();
        assert_eq!(action, CycleAction::Merged { bead_id });

        assert_eq!(dag.read(|dag| dag.get("polecat/rigA/Alpha").unwrap().status).await, NodeStatus::Merged);
        let beta = dag.read(|dag| dag.get("polecat/rigA/Beta").cloned()).await.unwrap();
        assert_eq!(beta.parent, None);
        assert_eq!(beta.status, NodeStatus::NeedsRebase);
    }

    async fn seed_mr_on_existing_branch(store: &InMemoryIssueStore, branch: &str, worker: &str, target: &str) -> String {
        let bead = store.create_mr_fields(branch, worker, "gt-1", target).await.unwrap();
        bead.id
    }

    #[tokio::test]
    async fn empty_queue_writes_idle_heartbeat() {
        let repo = tempdir().unwrap();
        init_repo(repo.path()).await;
        let dag = dag_store(repo.path()).await;
        let store: Arc<dyn IssueStore> = Arc::new(InMemoryIssueStore::new());
        let scheduler = Scheduler::new(
            store,
            "rigA",
            settings(vec![]),
            None,
            "claude",
            repo.path().to_path_buf(),
            dag,
            Arc::new(NullSignaler),
        );
        let dir = tempdir().unwrap();
        let path = dir.path().join("heartbeat.json");
        let hb = scheduler.tick(&QueueWeights::default(), None, &path).await.unwrap();
        assert_eq!(hb.queue_len, 0);
        assert_eq!(hb.processed_count, 0);
    }
}
