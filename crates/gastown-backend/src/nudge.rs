//! The nudge contract: wake a possibly-stuck agent by sending it text,
//! settling, escaping any modal input mode, then submitting — serialized
//! per session so concurrent nudges never interleave characters.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::trait_def::Backend;

const SETTLE: Duration = Duration::from_millis(150);
const RETRY_PAUSE: Duration = Duration::from_millis(250);
const MAX_SUBMIT_ATTEMPTS: u32 = 4;
const ESCAPE_KEY: &str = "Escape";
const SUBMIT_KEY: &str = "Enter";

fn session_locks() -> &'static Mutex<HashMap<String, Arc<Mutex<()>>>> {
    static LOCKS: OnceLock<Mutex<HashMap<String, Arc<Mutex<()>>>>> = OnceLock::new();
    LOCKS.get_or_init(|| Mutex::new(HashMap::new()))
}

async fn lock_for(session: &str) -> Arc<Mutex<()>> {
    let mut table = session_locks().lock().await;
    table.entry(session.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
}

/// A nonce distinguishing this nudge attempt in logs. Cosmetic only: it
/// has no invariant beyond being stable for the lifetime of one nudge
/// call, so a timestamp-free counter is enough.
fn nudge_slug(session: &str, attempt: u32) -> String {
    format!("nudge-{session}-{attempt}")
}

pub async fn nudge<B: Backend + ?Sized>(backend: &B, session: &str, text: &str) -> Result<()> {
    let lock = lock_for(session).await;
    let _guard = lock.lock().await;

    backend.send_input(session, text, false).await?;
    tokio::time::sleep(SETTLE).await;
    backend.send_keys(session, ESCAPE_KEY).await?;
    tokio::time::sleep(SETTLE).await;

    let mut result = backend.send_keys(session, SUBMIT_KEY).await;
    tracing::debug!(session, slug = %nudge_slug(session, 1), "submitting nudge");
    for attempt in 2..=MAX_SUBMIT_ATTEMPTS {
        if result.is_ok() {
            break;
        }
        tokio::time::sleep(RETRY_PAUSE).await;
        tracing::debug!(session, slug = %nudge_slug(session, attempt), "retrying nudge submit");
        result = backend.send_keys(session, SUBMIT_KEY).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use gastown_core::AgentState;

    use super::*;
    use crate::types::{EnvMap, ProcessStatus};

    /// A backend whose `send_keys` fails its first `fail_count` calls, then
    /// succeeds. Everything else is unused by the nudge contract.
    struct FlakySubmit {
        fail_count: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Backend for FlakySubmit {
        fn kind_name(&self) -> &'static str {
            "flaky-submit"
        }
        async fn has_session(&self, _s: &str) -> Result<bool> {
            Ok(true)
        }
        async fn capture_pane(&self, _s: &str, _n: usize) -> Result<String> {
            Ok(String::new())
        }
        async fn capture_pane_all(&self, _s: &str) -> Result<String> {
            Ok(String::new())
        }
        async fn send_input(&self, _s: &str, _t: &str, _e: bool) -> Result<()> {
            Ok(())
        }
        async fn send_keys(&self, _s: &str, _r: &str) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_count {
                Err(gastown_core::Error::not_supported("flaky-submit", "send_keys").into())
            } else {
                Ok(())
            }
        }
        async fn is_pane_dead(&self, _s: &str) -> Result<bool> {
            Ok(false)
        }
        async fn kill_session(&self, _s: &str) -> Result<()> {
            Ok(())
        }
        async fn is_agent_running(&self, _s: &str) -> Result<bool> {
            Ok(true)
        }
        async fn get_agent_state(&self, _s: &str) -> Result<AgentState> {
            Ok(AgentState::Spawning)
        }
        async fn get_env(&self, _s: &str, _k: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn set_env(&self, _s: &str, _k: &str, _v: &str) -> Result<()> {
            Ok(())
        }
        async fn get_cwd(&self, _s: &str) -> Result<String> {
            Ok(String::new())
        }
        async fn respawn(&self, _s: &str) -> Result<()> {
            Ok(())
        }
        async fn switch_session(&self, _s: &str, _e: &EnvMap) -> Result<()> {
            Ok(())
        }
        async fn set_pane_died_hook(&self, _s: &str, _c: &str) -> Result<()> {
            Ok(())
        }
        async fn status(&self, _s: &str) -> Result<ProcessStatus> {
            Ok(ProcessStatus { process_state: "running".into(), uptime_secs: 0 })
        }
    }

    #[tokio::test]
    async fn nudge_recovers_after_three_failed_submits() {
        let backend = FlakySubmit { fail_count: 3, calls: AtomicU32::new(0) };
        nudge(&backend, "gt-session-1", "hello").await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn nudge_gives_up_after_four_failed_submits() {
        let backend = FlakySubmit { fail_count: 4, calls: AtomicU32::new(0) };
        let err = nudge(&backend, "gt-session-1", "hello").await.unwrap_err();
        assert_eq!(err.kind(), gastown_core::ErrorKind::NotSupported);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    }
}
