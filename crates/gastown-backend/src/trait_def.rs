//! The capability set every backend variant implements. Methods a variant
//! cannot implement return [`gastown_core::Error::not_supported`] so
//! callers can branch explicitly rather than getting a silently-swallowed
//! no-op.

use async_trait::async_trait;
use gastown_core::AgentState;

use crate::error::Result;
use crate::types::{EnvMap, ProcessStatus};

#[async_trait]
pub trait Backend: Send + Sync {
    /// A name identifying this backend variant, used in `not_supported`
    /// error messages.
    fn kind_name(&self) -> &'static str;

    async fn has_session(&self, session: &str) -> Result<bool>;

    async fn capture_pane(&self, session: &str, lines: usize) -> Result<String>;

    async fn capture_pane_all(&self, session: &str) -> Result<String>;

    async fn send_input(&self, session: &str, text: &str, press_enter: bool) -> Result<()>;

    async fn send_keys(&self, session: &str, raw: &str) -> Result<()>;

    /// See the nudge contract in `crate::nudge`: implementations should
    /// not re-implement the retry/settle protocol themselves. The default
    /// provided here delegates to it.
    async fn nudge(&self, session: &str, text: &str) -> Result<()> {
        crate::nudge::nudge(self, session, text).await
    }

    async fn is_pane_dead(&self, session: &str) -> Result<bool>;

    async fn kill_session(&self, session: &str) -> Result<()>;

    async fn is_agent_running(&self, session: &str) -> Result<bool>;

    async fn get_agent_state(&self, session: &str) -> Result<AgentState>;

    async fn get_env(&self, session: &str, key: &str) -> Result<Option<String>>;

    async fn set_env(&self, session: &str, key: &str, value: &str) -> Result<()>;

    async fn get_cwd(&self, session: &str) -> Result<String>;

    async fn respawn(&self, session: &str) -> Result<()>;

    async fn switch_session(&self, session: &str, extra_env: &EnvMap) -> Result<()>;

    async fn set_pane_died_hook(&self, session: &str, command: &str) -> Result<()>;

    async fn status(&self, session: &str) -> Result<ProcessStatus>;
}

pub(crate) fn not_supported(backend: &'static str, capability: &'static str) -> crate::error::BackendError {
    gastown_core::Error::not_supported(backend, capability).into()
}
