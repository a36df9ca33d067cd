//! The rebase protocol: probe for conflicts without touching persistent
//! state, then perform the real rebase only once the probe comes back
//! clean.

use std::path::Path;
use std::time::Duration;

use gastown_core::error::Error;
use gastown_core::process::run;

use crate::error::Result;
use crate::node::NodeStatus;
use crate::signal::Signaler;
use crate::store::DagStore;

const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of attempting to rebase a branch onto its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    Clean,
    Conflict(Vec<String>),
}

async fn conflicted_files(workdir: &Path) -> Result<Vec<String>> {
    let out = run("git", &["diff", "--name-only", "--diff-filter=U"], Some(workdir), &[], GIT_TIMEOUT).await?;
    Ok(out.stdout.lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
}

async fn abort(workdir: &Path) {
    let _ = run("git", &["rebase", "--abort"], Some(workdir), &[], GIT_TIMEOUT).await;
}

/// Rebase `branch` (checked out in `workdir`) onto `onto`. Probes first
/// with a non-committing trial rebase that is always aborted; only a
/// clean probe proceeds to the real rebase.
pub async fn rebase(store: &DagStore, branch: &str, onto: &str, workdir: &Path, signaler: &dyn Signaler) -> Result<RebaseOutcome> {
    let probe = run("git", &["rebase", "--no-commit", onto], Some(workdir), &[], GIT_TIMEOUT).await?;
    let conflicts = if probe.success { Vec::new() } else { conflicted_files(workdir).await? };
    abort(workdir).await;

    if !conflicts.is_empty() {
        let worker = store
            .with_write(|dag| {
                dag.update(branch, |n| {
                    n.status = NodeStatus::Conflict;
                    n.conflict_files.clone_from(&conflicts);
                })?;
                Ok(dag.get(branch).and_then(|n| n.worker.clone()))
            })
            .await?;
        if let Some(worker) = worker {
            signaler.conflict(&worker, branch, &conflicts).await;
        }
        return Ok(RebaseOutcome::Conflict(conflicts));
    }

    let real = run("git", &["rebase", onto], Some(workdir), &[], GIT_TIMEOUT).await?;
    if !real.success {
        abort(workdir).await;
        return Err(Error::GitRebaseFailed(real.stderr).into());
    }

    let head = run("git", &["rev-parse", "HEAD"], Some(workdir), &[], GIT_TIMEOUT).await?;
    let onto_sha = run("git", &["rev-parse", onto], Some(workdir), &[], GIT_TIMEOUT).await?;
    let new_head = head.stdout.trim().to_string();
    let new_base = onto_sha.stdout.trim().to_string();

    let signals = store
        .with_write(|dag| {
            dag.update(branch, |n| n.base_sha.clone_from(&new_base))?;
            let flipped = dag.mark_updated(branch, new_head.clone())?;
            dag.update(branch, |n| n.status = NodeStatus::Clean)?;
            Ok(flipped
                .into_iter()
                .filter_map(|name| dag.get(&name).map(|n| (name, n.worker.clone())))
                .collect::<Vec<_>>())
        })
        .await?;

    for (descendant, worker) in signals {
        if let Some(worker) = worker {
            signaler.rebase_needed(&worker, &descendant, "parent branch rebased").await;
        }
    }

    Ok(RebaseOutcome::Clean)
}
