//! Git worktree creation and repair, with the three pre-spawn safety
//! gates: uncommitted work, an open MR against the worker's branch, and
//! otherwise a clean remove-and-recreate.

use std::path::Path;
use std::time::Duration;

use gastown_core::error::Error;
use gastown_core::process::run;

use crate::error::Result;

const GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// True if the worktree has uncommitted changes (tracked or untracked).
pub async fn has_uncommitted_work(worktree: &Path) -> Result<bool> {
    let out = run("git", &["status", "--porcelain"], Some(worktree), &[], GIT_TIMEOUT).await?;
    if !out.success {
        return Err(Error::WorktreeInvalid {
            path: worktree.display().to_string(),
            reason: out.stderr,
        }
        .into());
    }
    Ok(!out.stdout.trim().is_empty())
}

/// Gate 1+2: refuse to touch a dirty worktree or one whose branch has an
/// open MR, unless `force`.
pub async fn check_safe_to_repair(
    worktree: &Path,
    branch: &str,
    open_mr_branch: Option<&str>,
    force: bool,
) -> Result<()> {
    if !worktree.exists() {
        return Ok(());
    }
    if has_uncommitted_work(worktree).await? && !force {
        return Err(Error::WorktreeDirty {
            path: worktree.display().to_string(),
        }
        .into());
    }
    if open_mr_branch == Some(branch) && !force {
        return Err(Error::WorkerHasOpenMr {
            worker: worktree.display().to_string(),
            branch: branch.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Gate 3: tear down and recreate. The session must already be killed by
/// the caller (orphan-session-kill happens at the backend layer, not
/// here, since this module has no backend handle).
pub async fn remove_and_recreate(repo_root: &Path, worktree: &Path, branch: &str) -> Result<()> {
    if worktree.exists() {
        let worktree_str = worktree.display().to_string();
        let remove = run(
            "git",
            &["worktree", "remove", "--force", &worktree_str],
            Some(repo_root),
            &[],
            GIT_TIMEOUT,
        )
        .await?;
        if !remove.success {
            tokio::fs::remove_dir_all(worktree).await.ok();
        }
        let prune = run("git", &["worktree", "prune"], Some(repo_root), &[], GIT_TIMEOUT).await?;
        if !prune.success {
            return Err(Error::WorktreeInvalid {
                path: worktree.display().to_string(),
                reason: prune.stderr,
            }
            .into());
        }
    }
    create(repo_root, worktree, branch).await
}

/// Create a fresh worktree on `branch`, creating the branch if it does
/// not exist yet.
pub async fn create(repo_root: &Path, worktree: &Path, branch: &str) -> Result<()> {
    let worktree_str = worktree.display().to_string();
    let out = run(
        "git",
        &["worktree", "add", "-B", branch, &worktree_str],
        Some(repo_root),
        &[],
        GIT_TIMEOUT,
    )
    .await?;
    if !out.success {
        return Err(Error::WorktreeInvalid {
            path: worktree_str,
            reason: out.stderr,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn init_repo(path: &Path) {
        run("git", &["init", "--initial-branch=main"], Some(path), &[], GIT_TIMEOUT).await.unwrap();
        run("git", &["commit", "--allow-empty", "-m", "init"], Some(path), &[], GIT_TIMEOUT)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn nonexistent_worktree_is_always_safe_to_repair() {
        let dir = tempdir().unwrap();
        let worktree = dir.path().join("missing");
        assert!(check_safe_to_repair(&worktree, "feature/x", None, false).await.is_ok());
    }

    #[tokio::test]
    async fn create_then_detect_clean_worktree() {
        let repo = tempdir().unwrap();
        init_repo(repo.path()).await;
        let worktree = repo.path().join("polecats").join("Alpha");
        create(repo.path(), &worktree, "feature/alpha").await.unwrap();
        assert!(!has_uncommitted_work(&worktree).await.unwrap());
    }

    #[tokio::test]
    async fn dirty_worktree_is_rejected_without_force() {
        let repo = tempdir().unwrap();
        init_repo(repo.path()).await;
        let worktree = repo.path().join("polecats").join("Alpha");
        create(repo.path(), &worktree, "feature/alpha").await.unwrap();
        tokio::fs::write(worktree.join("scratch.txt"), "wip").await.unwrap();

        let err = check_safe_to_repair(&worktree, "feature/alpha", None, false).await.unwrap_err();
        assert_eq!(err.kind(), gastown_core::error::ErrorKind::WorktreeDirty);
        assert!(check_safe_to_repair(&worktree, "feature/alpha", None, true).await.is_ok());
    }

    #[tokio::test]
    async fn open_mr_branch_is_rejected_without_force() {
        let repo = tempdir().unwrap();
        init_repo(repo.path()).await;
        let worktree = repo.path().join("polecats").join("Alpha");
        create(repo.path(), &worktree, "feature/alpha").await.unwrap();

        let err = check_safe_to_repair(&worktree, "feature/alpha", Some("feature/alpha"), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), gastown_core::error::ErrorKind::WorkerHasOpenMr);
    }
}
