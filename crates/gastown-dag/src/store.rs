//! Atomic persistence for a [`BranchDag`]: one reader-writer lock guards
//! every mutation, and every successful write is a temp-file+rename so a
//! crash mid-write never corrupts the DAG file.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use gastown_core::error::Error;

use crate::error::Result;
use crate::graph::BranchDag;

/// A DAG backed by a JSON file, with a process-wide reader-writer lock
/// serializing every mutation.
#[derive(Debug, Clone)]
pub struct DagStore {
    path: PathBuf,
    inner: Arc<RwLock<BranchDag>>,
}

impl DagStore {
    /// Load the DAG from `path`, or start empty if the file does not
    /// exist yet.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let dag = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(Error::from)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BranchDag::new(),
            Err(err) => return Err(Error::from(err).into()),
        };
        Ok(Self { path, inner: Arc::new(RwLock::new(dag)) })
    }

    async fn persist(&self, dag: &BranchDag) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(Error::from)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(dag).map_err(Error::from)?;
        tokio::fs::write(&tmp, bytes).await.map_err(Error::from)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(Error::from)?;
        Ok(())
    }

    /// Run `f` under the write lock. On `Ok`, the DAG is persisted
    /// atomically before the lock is released; on `Err`, the in-memory
    /// DAG still reflects whatever `f` mutated (callers that need
    /// rollback-on-error must not mutate on the failure path, matching
    /// the orchestrator's own failure model).
    pub async fn with_write<T>(&self, f: impl FnOnce(&mut BranchDag) -> Result<T>) -> Result<T> {
        let mut dag = self.inner.write().await;
        let result = f(&mut dag)?;
        self.persist(&dag).await?;
        Ok(result)
    }

    /// Run `f` under the read lock.
    pub async fn read<T>(&self, f: impl FnOnce(&BranchDag) -> T) -> T {
        let dag = self.inner.read().await;
        f(&dag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BranchNode;
    use tempfile::tempdir;

    #[tokio::test]
    async fn load_missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let store = DagStore::load(dir.path().join("dag.json")).await.unwrap();
        assert!(store.read(BranchDag::is_empty).await);
    }

    #[tokio::test]
    async fn write_then_reload_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dag.json");
        let store = DagStore::load(path.clone()).await.unwrap();
        store
            .with_write(|dag| dag.add(BranchNode::new("main-child", None, "sha0")))
            .await
            .unwrap();

        let reloaded = DagStore::load(path).await.unwrap();
        assert_eq!(reloaded.read(BranchDag::len).await, 1);
    }

    #[tokio::test]
    async fn failed_mutation_does_not_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dag.json");
        let store = DagStore::load(path.clone()).await.unwrap();
        let err = store
            .with_write(|dag| dag.add(BranchNode::new("child", Some("ghost".to_string()), "sha0")))
            .await;
        assert!(err.is_err());
        assert!(!path.exists());
    }
}
