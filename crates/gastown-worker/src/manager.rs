//! Worker spawn/repair orchestration: ties name allocation, the worktree
//! safety gates, rate-limit backoff, and agent-bead bookkeeping together.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use gastown_backend::Backend;
use gastown_core::bead::{AgentState, Bead, RoleType};
use gastown_core::rig::RigPaths;
use gastown_core::store::{BeadFilter, IssueStore};

use crate::backoff::{path_for_rig, Backoff};
use crate::error::Result;
use crate::names;
use crate::worktree;

/// A materialized worker: its name, branch, worktree path, and the agent
/// bead recording it.
#[derive(Debug, Clone)]
pub struct Worker {
    pub name: String,
    pub branch: String,
    pub worktree: Option<std::path::PathBuf>,
    pub bead: Bead,
}

fn session_id(rig: &str, role: RoleType, name: &str) -> String {
    format!("gt-{rig}-{role}-{name}")
}

fn branch_name(rig: &str, role: RoleType, name: &str) -> String {
    format!("{role}/{rig}/{name}")
}

async fn live_names(store: &dyn IssueStore, rig: &str, role: RoleType) -> Result<Vec<String>> {
    let beads = store
        .list(&BeadFilter {
            bead_type: Some("agent".to_string()),
            rig: Some(rig.to_string()),
            ..BeadFilter::default()
        })
        .await?;
    Ok(beads
        .into_iter()
        .filter(|b| b.role_type == Some(role))
        .map(|b| b.metadata_get("name").map(str::to_string).unwrap_or(b.id))
        .collect())
}

/// Spawn a polecat: a fresh name is drawn from the pool, excluding names
/// already referenced by a live polecat bead in this rig.
pub async fn spawn_polecat(
    store: &dyn IssueStore,
    backend: &Arc<dyn Backend>,
    rig_paths: &RigPaths,
    repo_root: &Path,
    rig: &str,
    k8s: bool,
    force: bool,
) -> Result<Worker> {
    let taken = live_names(store, rig, RoleType::Polecat).await?;
    let name = names::allocate(&taken);
    spawn_named(store, backend, rig_paths, repo_root, rig, RoleType::Polecat, &name, k8s, force).await
}

/// Spawn or repair a crew worker. Crew are named explicitly by the caller
/// since crew identity is long-lived and externally meaningful, not drawn
/// from the ephemeral polecat pool.
pub async fn spawn_crew(
    store: &dyn IssueStore,
    backend: &Arc<dyn Backend>,
    rig_paths: &RigPaths,
    repo_root: &Path,
    rig: &str,
    name: &str,
    k8s: bool,
    force: bool,
) -> Result<Worker> {
    spawn_named(store, backend, rig_paths, repo_root, rig, RoleType::Crew, name, k8s, force).await
}

#[allow(clippy::too_many_arguments)]
async fn spawn_named(
    store: &dyn IssueStore,
    backend: &Arc<dyn Backend>,
    rig_paths: &RigPaths,
    repo_root: &Path,
    rig: &str,
    role: RoleType,
    name: &str,
    k8s: bool,
    force: bool,
) -> Result<Worker> {
    let backoff = Backoff::new(path_for_rig(rig_paths.root()));
    backoff.check().await?;

    let session = session_id(rig, role, name);
    let branch = branch_name(rig, role, name);

    if k8s {
        let bead = write_agent_bead(store, &session, rig, role, name, true).await?;
        backoff.reset().await?;
        return Ok(Worker { name: name.to_string(), branch, worktree: None, bead });
    }

    let worktree = match role {
        RoleType::Crew => rig_paths.crew_worktree(name),
        _ => rig_paths.polecat_worktree(name),
    };

    let open_mr = store
        .find_mr_for_branch(&branch)
        .await?
        .filter(|mr| !mr.status.is_closed());
    worktree::check_safe_to_repair(&worktree, &branch, open_mr.as_ref().map(|_| branch.as_str()), force).await?;

    if worktree.exists() {
        if backend.has_session(&session).await.unwrap_or(false) {
            backend.kill_session(&session).await.ok();
        }
        worktree::remove_and_recreate(repo_root, &worktree, &branch).await?;
    } else {
        worktree::create(repo_root, &worktree, &branch).await?;
    }

    let bead = match write_agent_bead(store, &session, rig, role, name, false).await {
        Ok(bead) => bead,
        Err(err) => return Err(err),
    };

    backoff.reset().await?;
    Ok(Worker { name: name.to_string(), branch, worktree: Some(worktree), bead })
}

async fn write_agent_bead(
    store: &dyn IssueStore,
    id: &str,
    rig: &str,
    role: RoleType,
    name: &str,
    k8s: bool,
) -> Result<Bead> {
    let mut fields = BTreeMap::new();
    fields.insert("rig".to_string(), rig.to_string());
    fields.insert("role_type".to_string(), role.to_string());
    fields.insert("name".to_string(), name.to_string());
    fields.insert("agent_state".to_string(), AgentState::Spawning.to_string());

    let title = format!("{role} {name}");
    let bead = store.create_or_reopen_agent(id, &title, &fields).await?;
    if k8s {
        store.add_label(id, "execution_target:k8s").await?;
    }
    Ok(bead)
}

/// Record a spawn failure the session manager identified as rate-limited:
/// advances the backoff counter and returns the new delay so the caller
/// can mail the rig's witness.
pub async fn record_rate_limited(rig_paths: &RigPaths) -> Result<std::time::Duration> {
    let backoff = Backoff::new(path_for_rig(rig_paths.root()));
    Ok(backoff.strike().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gastown_backend::types::{EnvMap, ProcessStatus};
    use gastown_backend::Result as BackendResult;
    use gastown_core::store::InMemoryIssueStore;
    use gastown_core::AgentState as CoreAgentState;
    use tempfile::tempdir;

    struct NoopBackend;

    #[async_trait]
    impl Backend for NoopBackend {
        fn kind_name(&self) -> &'static str {
            "test"
        }
        async fn has_session(&self, _s: &str) -> BackendResult<bool> {
            Ok(false)
        }
        async fn capture_pane(&self, _s: &str, _n: usize) -> BackendResult<String> {
            Ok(String::new())
        }
        async fn capture_pane_all(&self, _s: &str) -> BackendResult<String> {
            Ok(String::new())
        }
        async fn send_input(&self, _s: &str, _t: &str, _e: bool) -> BackendResult<()> {
            Ok(())
        }
        async fn send_keys(&self, _s: &str, _r: &str) -> BackendResult<()> {
            Ok(())
        }
        async fn is_pane_dead(&self, _s: &str) -> BackendResult<bool> {
            Ok(false)
        }
        async fn kill_session(&self, _s: &str) -> BackendResult<()> {
            Ok(())
        }
        async fn is_agent_running(&self, _s: &str) -> BackendResult<bool> {
            Ok(false)
        }
        async fn get_agent_state(&self, _s: &str) -> BackendResult<CoreAgentState> {
            Ok(CoreAgentState::Spawning)
        }
        async fn get_env(&self, _s: &str, _k: &str) -> BackendResult<Option<String>> {
            Ok(None)
        }
        async fn set_env(&self, _s: &str, _k: &str, _v: &str) -> BackendResult<()> {
            Ok(())
        }
        async fn get_cwd(&self, _s: &str) -> BackendResult<String> {
            Ok(String::new())
        }
        async fn respawn(&self, _s: &str) -> BackendResult<()> {
            Ok(())
        }
        async fn switch_session(&self, _s: &str, _e: &EnvMap) -> BackendResult<()> {
            Ok(())
        }
        async fn set_pane_died_hook(&self, _s: &str, _c: &str) -> BackendResult<()> {
            Ok(())
        }
        async fn status(&self, _s: &str) -> BackendResult<ProcessStatus> {
            Ok(ProcessStatus { process_state: "absent".into(), uptime_secs: 0 })
        }
    }

    async fn init_repo(path: &Path) {
        gastown_core::process::run("git", &["init", "--initial-branch=main"], Some(path), &[], std::time::Duration::from_secs(10))
            .await
            .unwrap();
        gastown_core::process::run(
            "git",
            &["commit", "--allow-empty", "-m", "init"],
            Some(path),
            &[],
            std::time::Duration::from_secs(10),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn k8s_spawn_skips_worktree_entirely() {
        let store = InMemoryIssueStore::new();
        let backend: Arc<dyn Backend> = Arc::new(NoopBackend);
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(".beads")).unwrap();
        let town = gastown_core::rig::TownRoot::resolve(root.path()).unwrap();
        let rig_paths = town.rig("rigA");

        let worker = spawn_polecat(&store, &backend, &rig_paths, root.path(), "rigA", true, false)
            .await
            .unwrap();
        assert!(worker.worktree.is_none());
        assert!(worker.bead.has_label("execution_target:k8s"));
        assert_eq!(worker.bead.agent_state, Some(CoreAgentState::Spawning));
    }

    #[tokio::test]
    async fn local_spawn_creates_worktree_and_bead() {
        let store = InMemoryIssueStore::new();
        let backend: Arc<dyn Backend> = Arc::new(NoopBackend);
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(".beads")).unwrap();
        init_repo(root.path()).await;
        let town = gastown_core::rig::TownRoot::resolve(root.path()).unwrap();
        let rig_paths = town.rig("rigA");

        let worker = spawn_polecat(&store, &backend, &rig_paths, root.path(), "rigA", false, false)
            .await
            .unwrap();
        assert!(worker.worktree.as_ref().unwrap().exists());
        assert_eq!(worker.name, "Alpha");
    }

    #[tokio::test]
    async fn second_spawn_allocates_a_different_name() {
        let store = InMemoryIssueStore::new();
        let backend: Arc<dyn Backend> = Arc::new(NoopBackend);
        let root = tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(".beads")).unwrap();
        init_repo(root.path()).await;
        let town = gastown_core::rig::TownRoot::resolve(root.path()).unwrap();
        let rig_paths = town.rig("rigA");

        let first = spawn_polecat(&store, &backend, &rig_paths, root.path(), "rigA", false, false)
            .await
            .unwrap();
        let second = spawn_polecat(&store, &backend, &rig_paths, root.path(), "rigA", false, false)
            .await
            .unwrap();
        assert_ne!(first.name, second.name);
    }
}
