//! A [`Backend`] that tunnels local-multiplexer commands over a secure
//! shell to a remote host, reusing [`crate::local::LocalMultiplexer`]'s
//! argv shapes but prefixed with `ssh <host> --`.

use async_trait::async_trait;
use gastown_core::process::{self, CommandOutput};
use gastown_core::AgentState;
use std::time::Duration;

use crate::error::Result;
use crate::trait_def::{not_supported, Backend};
use crate::types::{EnvMap, ProcessStatus};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Drives a multiplexer on `host` over `ssh`, one argv per call (no shell
/// string is built locally; `ssh` itself receives the remote command as
/// discrete trailing arguments).
#[derive(Debug, Clone)]
pub struct RemoteExec {
    host: String,
    remote_program: String,
}

impl RemoteExec {
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into(), remote_program: "zellij".to_string() }
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut argv = vec![self.host.as_str(), "--", self.remote_program.as_str()];
        argv.extend_from_slice(args);
        Ok(process::run("ssh", &argv, None, &[], DEFAULT_TIMEOUT).await?)
    }
}

#[async_trait]
impl Backend for RemoteExec {
    fn kind_name(&self) -> &'static str {
        "RemoteExec"
    }

    async fn has_session(&self, session: &str) -> Result<bool> {
        let out = self.run(&["list-sessions", "--short"]).await?;
        Ok(out.stdout.lines().any(|l| l.trim() == session))
    }

    async fn capture_pane(&self, session: &str, lines: usize) -> Result<String> {
        let lines_arg = lines.to_string();
        let out = self.run(&["action", "dump-screen", "--session", session, "--lines", &lines_arg]).await?;
        Ok(out.stdout)
    }

    async fn capture_pane_all(&self, session: &str) -> Result<String> {
        let out = self.run(&["action", "dump-screen", "--session", session, "--full"]).await?;
        Ok(out.stdout)
    }

    async fn send_input(&self, session: &str, text: &str, press_enter: bool) -> Result<()> {
        self.run(&["action", "write-chars", "--session", session, text]).await?;
        if press_enter {
            self.send_keys(session, "Enter").await?;
        }
        Ok(())
    }

    async fn send_keys(&self, session: &str, raw: &str) -> Result<()> {
        self.run(&["action", "write", "--session", session, raw]).await?;
        Ok(())
    }

    async fn is_pane_dead(&self, session: &str) -> Result<bool> {
        Ok(!self.has_session(session).await?)
    }

    async fn kill_session(&self, session: &str) -> Result<()> {
        self.run(&["kill-session", session]).await?;
        Ok(())
    }

    async fn is_agent_running(&self, session: &str) -> Result<bool> {
        Ok(self.has_session(session).await? && !self.is_pane_dead(session).await?)
    }

    async fn get_agent_state(&self, _session: &str) -> Result<AgentState> {
        Err(not_supported(self.kind_name(), "get_agent_state"))
    }

    async fn get_env(&self, _session: &str, _key: &str) -> Result<Option<String>> {
        Err(not_supported(self.kind_name(), "get_env"))
    }

    async fn set_env(&self, _session: &str, _key: &str, _value: &str) -> Result<()> {
        Err(not_supported(self.kind_name(), "set_env"))
    }

    async fn get_cwd(&self, _session: &str) -> Result<String> {
        Err(not_supported(self.kind_name(), "get_cwd"))
    }

    async fn respawn(&self, session: &str) -> Result<()> {
        self.kill_session(session).await
    }

    async fn switch_session(&self, session: &str, _extra_env: &EnvMap) -> Result<()> {
        self.run(&["action", "go-to-tab-name", session]).await?;
        Ok(())
    }

    async fn set_pane_died_hook(&self, _session: &str, _command: &str) -> Result<()> {
        Err(not_supported(self.kind_name(), "set_pane_died_hook"))
    }

    async fn status(&self, session: &str) -> Result<ProcessStatus> {
        let alive = self.has_session(session).await?;
        Ok(ProcessStatus {
            process_state: if alive { "running".to_string() } else { "absent".to_string() },
            uptime_secs: 0,
        })
    }
}
