//! `bd`-backed [`IssueStore`].
//!
//! `BEADS_DIR` points `bd` at the right `.beads/` directory; every call is
//! a fixed argv shape with an explicit timeout, never a shell string.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::bead::{Bead, BeadStatus};
use crate::error::{Error, Result};
use crate::process::{self, CommandOutput};

use super::{BeadFilter, IssueStore, MergeSlotStatus, UpdateFields, READ_TIMEOUT, WRITE_TIMEOUT};

/// An [`IssueStore`] that shells out to the `bd` binary.
#[derive(Debug, Clone)]
pub struct BdIssueStore {
    beads_dir: PathBuf,
}

impl BdIssueStore {
    #[must_use]
    pub fn new(beads_dir: PathBuf) -> Self {
        Self { beads_dir }
    }

    async fn run(&self, args: &[&str], write: bool) -> Result<CommandOutput> {
        let timeout = if write { WRITE_TIMEOUT } else { READ_TIMEOUT };
        let beads_dir = self.beads_dir.to_string_lossy().into_owned();
        let out = process::run("bd", args, None, &[("BEADS_DIR", beads_dir.as_str())], timeout).await?;
        if !out.success {
            return Err(classify_failure(&out.stderr));
        }
        Ok(out)
    }

    fn parse_bead(json: &str) -> Result<Bead> {
        let raw: BdBead = serde_json::from_str(json)?;
        Ok(raw.into())
    }

    fn parse_beads(json: &str) -> Result<Vec<Bead>> {
        let raw: Vec<BdBead> = serde_json::from_str(json)?;
        Ok(raw.into_iter().map(Into::into).collect())
    }
}

/// Wire shape of one `bd --json` bead record.
#[derive(Debug, Deserialize)]
struct BdBead {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    status: String,
    #[serde(default)]
    priority: u8,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(rename = "type", default)]
    bead_type: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    fields: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    close_reason: Option<String>,
    #[serde(default)]
    hook_bead: Option<String>,
    #[serde(default)]
    role_type: Option<String>,
    #[serde(default)]
    rig: Option<String>,
    #[serde(default)]
    agent_state: Option<String>,
    #[serde(default)]
    convoy_id: Option<String>,
}

impl From<BdBead> for Bead {
    fn from(raw: BdBead) -> Self {
        Self {
            id: raw.id,
            title: raw.title,
            description: raw.description,
            status: raw.status.parse().unwrap_or(BeadStatus::Open),
            priority: raw.priority,
            assignee: raw.assignee,
            bead_type: raw.bead_type,
            labels: raw.labels,
            metadata: raw.fields,
            created_at: raw.created_at,
            close_reason: raw.close_reason.map(crate::bead::CloseReason),
            hook_bead: raw.hook_bead,
            role_type: raw.role_type.and_then(|s| s.parse().ok()),
            rig: raw.rig,
            agent_state: raw.agent_state.and_then(|s| s.parse().ok()),
            convoy_id: raw.convoy_id,
        }
    }
}

fn classify_failure(stderr: &str) -> Error {
    if stderr.contains("not found") {
        Error::BeadNotFound(stderr.trim().to_string())
    } else {
        Error::StoreUnavailable(stderr.trim().to_string())
    }
}

#[async_trait]
impl IssueStore for BdIssueStore {
    async fn list(&self, filters: &BeadFilter) -> Result<Vec<Bead>> {
        let mut args = vec!["list".to_string(), "--json".to_string()];
        if let Some(status) = filters.status {
            args.push("--status".to_string());
            args.push(status.to_string());
        }
        if let Some(bead_type) = &filters.bead_type {
            args.push("--type".to_string());
            args.push(bead_type.clone());
        }
        if let Some(rig) = &filters.rig {
            args.push("--rig".to_string());
            args.push(rig.clone());
        }
        if let Some(label) = &filters.label {
            args.push("--label".to_string());
            args.push(label.clone());
        }
        if let Some((key, value)) = &filters.field {
            args.push("--field".to_string());
            args.push(format!("{key}={value}"));
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.run(&args, false).await?;
        Self::parse_beads(&out.stdout)
    }

    async fn show(&self, id: &str) -> Result<Bead> {
        let out = self.run(&["show", "--json", id], false).await?;
        Self::parse_bead(&out.stdout)
    }

    async fn create_or_reopen_agent(
        &self,
        id: &str,
        title: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<Bead> {
        let mut args = vec![
            "create".to_string(),
            "--json".to_string(),
            "--id".to_string(),
            id.to_string(),
            "--title".to_string(),
            title.to_string(),
        ];
        for (key, value) in fields {
            args.push("--field".to_string());
            args.push(format!("{key}={value}"));
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.run(&args, true).await?;
        Self::parse_bead(&out.stdout)
    }

    async fn close_with_reason(&self, id: &str, reason: &str) -> Result<()> {
        self.run(&["close", id, "--reason", reason], true).await?;
        Ok(())
    }

    async fn add_label(&self, id: &str, label: &str) -> Result<()> {
        self.run(&["label", "add", id, label], true).await?;
        Ok(())
    }

    async fn set_hook_bead(&self, id: &str, bead: &str) -> Result<()> {
        let field = format!("hook_bead={bead}");
        self.run(&["update", id, "--field", &field], true).await?;
        Ok(())
    }

    async fn update(&self, id: &str, fields: &UpdateFields) -> Result<()> {
        let mut args = vec!["update".to_string(), id.to_string()];
        if let Some(status) = fields.status {
            args.push("--status".to_string());
            args.push(status.to_string());
        }
        if let Some(assignee) = &fields.assignee {
            args.push("--assignee".to_string());
            args.push(assignee.clone());
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&args, true).await?;
        Ok(())
    }

    async fn create_mr_fields(
        &self,
        branch: &str,
        worker: &str,
        source: &str,
        target: &str,
    ) -> Result<Bead> {
        let branch_field = format!("branch={branch}");
        let worker_field = format!("worker={worker}");
        let source_field = format!("source={source}");
        let target_field = format!("target={target}");
        let out = self
            .run(
                &[
                    "create",
                    "--json",
                    "--type",
                    "merge-request",
                    "--field",
                    &branch_field,
                    "--field",
                    &worker_field,
                    "--field",
                    &source_field,
                    "--field",
                    &target_field,
                ],
                true,
            )
            .await?;
        Self::parse_bead(&out.stdout)
    }

    async fn find_mr_for_branch(&self, branch: &str) -> Result<Option<Bead>> {
        let field_arg = format!("branch={branch}");
        let out = self
            .run(&["list", "--json", "--type", "merge-request", "--field", &field_arg], false)
            .await?;
        let beads = Self::parse_beads(&out.stdout)?;
        Ok(beads.into_iter().next())
    }

    async fn merge_slot_acquire(&self, holder: &str, add_waiter: bool) -> Result<MergeSlotStatus> {
        let mut args = vec!["lock", "acquire", "merge-slot", "--holder", holder];
        if add_waiter {
            args.push("--wait");
        }
        let out = self.run(&args, true).await?;
        let parsed: BdLockStatus = serde_json::from_str(&out.stdout)?;
        Ok(MergeSlotStatus {
            available: parsed.available,
            holder: parsed.holder,
        })
    }

    async fn merge_slot_release(&self, holder: &str) -> Result<()> {
        self.run(&["lock", "release", "merge-slot", "--holder", holder], true).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct BdLockStatus {
    available: bool,
    #[serde(default)]
    holder: Option<String>,
}
