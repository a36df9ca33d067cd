//! The `Signaler` capability: the orchestrator's only way to reach back
//! out to a branch's worker. Signaling is best-effort — a failed signal
//! never rolls back a DAG mutation that already succeeded.

use async_trait::async_trait;

#[async_trait]
pub trait Signaler: Send + Sync {
    async fn rebase_needed(&self, worker: &str, branch: &str, reason: &str);
    async fn conflict(&self, worker: &str, branch: &str, files: &[String]);
    async fn merged(&self, worker: &str, branch: &str);
    async fn retargeted(&self, worker: &str, branch: &str, old_parent: &str, new_parent: &str);
}

/// A `Signaler` that drops every signal, for call sites (tests, dry
/// runs) that have nowhere to route them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSignaler;

#[async_trait]
impl Signaler for NullSignaler {
    async fn rebase_needed(&self, _worker: &str, _branch: &str, _reason: &str) {}
    async fn conflict(&self, _worker: &str, _branch: &str, _files: &[String]) {}
    async fn merged(&self, _worker: &str, _branch: &str) {}
    async fn retargeted(&self, _worker: &str, _branch: &str, _old_parent: &str, _new_parent: &str) {}
}
