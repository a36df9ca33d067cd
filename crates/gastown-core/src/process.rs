//! Subprocess orchestration helper: every external binary the core
//! touches — `bd`, `git` — is invoked through this one narrow function,
//! never through a shell string.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{Error, Result};

/// The outcome of a subprocess call: exit status plus captured streams.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args` inside `cwd`, bounded by `timeout_duration`.
///
/// Arguments are passed as discrete `argv` elements; nothing is
/// interpolated into a shell string. A timed-out child is killed before
/// returning.
pub async fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    env: &[(&str, &str)],
    timeout_duration: Duration,
) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.kill_on_drop(true);

    let output = timeout(timeout_duration, cmd.output())
        .await
        .map_err(|_| Error::StoreTimeout(timeout_duration))?
        .map_err(|e| Error::Io(format!("failed to spawn {program}: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if should_log_output() {
        tracing::info!(program, success = output.status.success(), %stdout, %stderr, "subprocess output");
    } else {
        tracing::debug!(program, success = output.status.success(), "subprocess completed");
    }

    Ok(CommandOutput {
        success: output.status.success(),
        stdout,
        stderr,
    })
}

/// `GT_LOG_BD_OUTPUT` telemetry opt-in.
fn should_log_output() -> bool {
    std::env::var("GT_LOG_BD_OUTPUT").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Check that a binary is on `PATH` (grounded on the teacher's
/// `jj::check::check_jj_installed`), used before shelling out so a
/// missing-binary failure is reported distinctly from a command failure.
#[must_use]
pub fn is_installed(program: &str) -> bool {
    which::which(program).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_captures_stdout() {
        let out = run("echo", &["hello"], None, &[], Duration::from_secs(5))
            .await
            .expect("run");
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn run_times_out() {
        let result = run("sleep", &["5"], None, &[], Duration::from_millis(50)).await;
        assert_eq!(result.unwrap_err().kind(), crate::error::ErrorKind::StoreTimeout);
    }

    #[tokio::test]
    async fn run_reports_nonzero_exit_without_erroring() {
        let out = run("false", &[], None, &[], Duration::from_secs(5))
            .await
            .expect("run");
        assert!(!out.success);
    }
}
