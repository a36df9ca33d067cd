//! Bounded-concurrency health-check fan-out over a list of sessions.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use gastown_backend::Backend;

use crate::session::Session;

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Check `is_agent_running` for every session, bounded to `workers`
/// concurrent checks with a `timeout` per call. A failing or timed-out
/// check marks that session `alive=false`; it never fails the whole
/// listing.
pub async fn check_all(
    backend: &Arc<dyn Backend>,
    sessions: Vec<Session>,
    workers: usize,
    timeout: Duration,
) -> Vec<Session> {
    stream::iter(sessions)
        .map(|mut session| {
            let backend = Arc::clone(backend);
            async move {
                let alive = match tokio::time::timeout(timeout, backend.is_agent_running(&session.session_id)).await {
                    Ok(Ok(alive)) => alive,
                    Ok(Err(err)) => {
                        tracing::debug!(session = %session.session_id, error = %err, "health check failed");
                        false
                    }
                    Err(_) => {
                        tracing::debug!(session = %session.session_id, "health check timed out");
                        false
                    }
                };
                session.alive = Some(alive);
                session
            }
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gastown_backend::types::{EnvMap, ProcessStatus};
    use gastown_backend::Result as BackendResult;
    use gastown_core::config::ExecutionTarget;
    use gastown_core::{AgentState, RoleType};

    struct AlwaysAlive;
    struct AlwaysErrors;

    #[async_trait]
    impl Backend for AlwaysAlive {
        fn kind_name(&self) -> &'static str {
            "test"
        }
        async fn has_session(&self, _s: &str) -> BackendResult<bool> {
            Ok(true)
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
            Ok(true)
        }
        async fn get_agent_state(&self, _s: &str) -> BackendResult<AgentState> {
            Ok(AgentState::Working)
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
            Ok(ProcessStatus { process_state: "running".into(), uptime_secs: 1 })
        }
    }

    #[async_trait]
    impl Backend for AlwaysErrors {
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
            Ok(true)
        }
        async fn kill_session(&self, _s: &str) -> BackendResult<()> {
            Ok(())
        }
        async fn is_agent_running(&self, _s: &str) -> BackendResult<bool> {
            Err(gastown_core::Error::StoreUnavailable("down".into()).into())
        }
        async fn get_agent_state(&self, _s: &str) -> BackendResult<AgentState> {
            Ok(AgentState::Crashed)
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

    fn sample_session(id: &str) -> Session {
        Session {
            bead_id: id.to_string(),
            rig: "rigA".to_string(),
            role: RoleType::Polecat,
            name: id.to_string(),
            session_id: id.to_string(),
            backend_kind: gastown_backend::BackendKind::LocalMultiplexer,
            remote_url: None,
            target: ExecutionTarget::Local,
            agent_state: AgentState::Working,
            hook_bead: None,
            alive: None,
        }
    }

    #[tokio::test]
    async fn healthy_backend_marks_sessions_alive() {
        let backend: Arc<dyn Backend> = Arc::new(AlwaysAlive);
        let sessions = vec![sample_session("a"), sample_session("b")];
        let checked = check_all(&backend, sessions, 2, Duration::from_secs(1)).await;
        assert!(checked.iter().all(|s| s.alive == Some(true)));
    }

    #[tokio::test]
    async fn failing_backend_marks_false_without_failing_the_listing() {
        let backend: Arc<dyn Backend> = Arc::new(AlwaysErrors);
        let sessions = vec![sample_session("a"), sample_session("b")];
        let checked = check_all(&backend, sessions, 2, Duration::from_secs(1)).await;
        assert_eq!(checked.len(), 2);
        assert!(checked.iter().all(|s| s.alive == Some(false)));
    }
}
