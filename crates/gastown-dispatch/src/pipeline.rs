//! The `sling` dispatch pipeline: the eight-step sequence that pins a
//! bead to a worker.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gastown_backend::Backend;
use gastown_core::bead::{Bead, BeadStatus};
use gastown_core::config::{ExecutionTarget, RigSettings};
use gastown_core::error::Error;
use gastown_core::mailbox::Envelope;
use gastown_core::process;
use gastown_core::rig::TownRoot;
use gastown_core::store::{IssueStore, UpdateFields};

use crate::convoy;
use crate::error::Result;
use crate::formula::FormulaEngine;
use crate::mailer::Mailer;
use crate::target::{self, Target};

const GIT_CONFIG_TIMEOUT: Duration = Duration::from_secs(10);

/// One `sling` call's input. Mirrors the CLI flags named in the pipeline
/// description; `dispatcher`/`args` are free-text tags recorded on the
/// hooked bead for observability.
pub struct DispatchRequest<'a> {
    pub bead_id: &'a str,
    pub target: &'a str,
    pub dispatcher: &'a str,
    pub args: &'a str,
    pub no_merge: bool,
    pub merge_strategy: Option<&'a str>,
    pub convoy: Option<&'a str>,
    pub no_convoy: bool,
    pub raw: bool,
    pub force: bool,
    pub execution_target: Option<ExecutionTarget>,
}

/// The result of a successful sling: which bead ended up hooked, to
/// which agent, and what dispatch metadata was recorded alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub raw_bead_id: String,
    pub hooked_bead_id: String,
    pub agent_id: String,
    pub convoy_id: Option<String>,
    pub attached_molecule: Option<String>,
}

#[allow(clippy::too_many_arguments)]
pub async fn sling(
    store: &dyn IssueStore,
    backend: &Arc<dyn Backend>,
    formula: &dyn FormulaEngine,
    mailer: &dyn Mailer,
    town_root: &Path,
    rig_settings: &RigSettings,
    request: &DispatchRequest<'_>,
) -> Result<DispatchOutcome> {
    // Step 1: resolve town root, set maintainer git config.
    let town = TownRoot::resolve(town_root)?;
    process::run("git", &["config", "beads.role", "maintainer"], Some(town.path()), &[], GIT_CONFIG_TIMEOUT).await?;

    // Step 2: validate.
    let raw_bead = store.show(request.bead_id).await?;
    if raw_bead.status.is_closed() {
        return Err(Error::BeadClosed(raw_bead.id.clone()).into());
    }
    if raw_bead.status.is_hooked_or_pinned() {
        if !request.force {
            return Err(Error::BeadAlreadyHooked {
                bead: raw_bead.id.clone(),
                hooked_to: raw_bead.assignee.clone().unwrap_or_default(),
            }
            .into());
        }
        unhook_for_force(store, mailer, &raw_bead).await?;
    }

    // Step 3: classify target.
    let classified = target::classify(store, request.target).await?;

    // Step 4: convoy membership.
    let convoy_id = convoy::resolve(store, &raw_bead, request.convoy, request.no_convoy).await?;

    // Step 5: formula auto-apply (polecat targets only, unless raw).
    let is_polecat_target = matches!(classified, Target::Rig(_));
    let (hooked_bead_id, attached_molecule) = if is_polecat_target && !request.raw {
        let wisp_root = formula.instantiate_polecat_work(&raw_bead.id).await?;
        if wisp_root != raw_bead.id {
            (wisp_root.clone(), Some(wisp_root))
        } else {
            (raw_bead.id.clone(), None)
        }
    } else {
        (raw_bead.id.clone(), None)
    };

    // Step 6: spawn-if-rig.
    let agent_id = resolve_agent(store, backend, &town, rig_settings, &classified, request.execution_target).await?;

    // Step 7: hook atomically.
    store
        .update(&hooked_bead_id, &UpdateFields { status: Some(BeadStatus::Hooked), assignee: Some(agent_id.clone()) })
        .await?;

    // Step 8: propagate.
    store.set_hook_bead(&agent_id, &hooked_bead_id).await?;
    tracing::info!(bead = %hooked_bead_id, agent = %agent_id, dispatcher = %request.dispatcher, "dispatched");
    record_dispatch_metadata(store, &hooked_bead_id, request, convoy_id.is_some()).await?;
    // The molecule pointer belongs on the raw bead, not the wisp root the
    // formula hooked in its place, so the original request stays traceable
    // to whatever work the formula actually spawned.
    if let Some(molecule) = &attached_molecule {
        store.add_label(&raw_bead.id, &format!("attached-molecule:{molecule}")).await?;
    }

    if matches!(classified, Target::Crew { .. }) {
        let mut mail = Envelope::new(request.dispatcher, agent_id.as_str(), "work assigned", hooked_bead_id.as_str());
        mail.skip_notify = true;
        mailer.deliver(&mail).await?;
    }

    if let Target::Rig(rig) = &classified {
        wake_rig(backend, rig).await;
    }

    Ok(DispatchOutcome { raw_bead_id: raw_bead.id, hooked_bead_id, agent_id, convoy_id, attached_molecule })
}

/// Batch variant: cook the formula once per bead, spawn a fresh worker
/// for each, hook and record metadata, then wake the rig exactly once.
/// Per-item failures do not abort the batch.
pub async fn sling_batch(
    store: &dyn IssueStore,
    backend: &Arc<dyn Backend>,
    formula: &dyn FormulaEngine,
    mailer: &dyn Mailer,
    town_root: &Path,
    rig_settings: &RigSettings,
    rig: &str,
    requests: &[DispatchRequest<'_>],
) -> Vec<Result<DispatchOutcome>> {
    let mut results = Vec::with_capacity(requests.len());
    for request in requests {
        results.push(sling(store, backend, formula, mailer, town_root, rig_settings, request).await);
    }
    wake_rig(backend, rig).await;
    results
}

async fn unhook_for_force(store: &dyn IssueStore, mailer: &dyn Mailer, bead: &Bead) -> Result<()> {
    if let Some(worker) = &bead.assignee {
        let witness = format!("{worker}-witness");
        mailer.deliver(&Envelope::lifecycle_shutdown("dispatch", witness, worker)).await?;
    }
    store.update(&bead.id, &UpdateFields { status: Some(BeadStatus::Open), assignee: None }).await?;
    Ok(())
}

async fn resolve_agent(
    store: &dyn IssueStore,
    backend: &Arc<dyn Backend>,
    town: &TownRoot,
    rig_settings: &RigSettings,
    classified: &Target,
    execution_override: Option<ExecutionTarget>,
) -> Result<String> {
    match classified {
        Target::ExistingAgent(id) | Target::LiteralAgentId(id) => Ok(id.clone()),
        Target::DogPool => Ok(target::next_idle_dog(store).await?.id),
        Target::Crew { rig, name } => {
            let rig_paths = town.rig(rig);
            let k8s = resolve_execution_target(execution_override, rig_settings) == ExecutionTarget::K8s;
            let worker = gastown_worker::spawn_crew(store, backend, &rig_paths, town.path(), rig, name, k8s, false).await?;
            Ok(worker.bead.id)
        }
        Target::Rig(rig) => {
            let rig_paths = town.rig(rig);
            let k8s = resolve_execution_target(execution_override, rig_settings) == ExecutionTarget::K8s;
            let worker = gastown_worker::spawn_polecat(store, backend, &rig_paths, town.path(), rig, k8s, false).await?;
            Ok(worker.bead.id)
        }
    }
}

fn resolve_execution_target(explicit: Option<ExecutionTarget>, rig_settings: &RigSettings) -> ExecutionTarget {
    explicit
        .or(rig_settings.execution_target)
        .or_else(gastown_core::config::execution_target_override)
        .unwrap_or(ExecutionTarget::Local)
}

async fn record_dispatch_metadata(
    store: &dyn IssueStore,
    bead_id: &str,
    request: &DispatchRequest<'_>,
    convoy_owned: bool,
) -> Result<()> {
    store.add_label(bead_id, &format!("dispatcher:{}", request.dispatcher)).await?;
    if !request.args.is_empty() {
        store.add_label(bead_id, &format!("dispatch-args:{}", request.args)).await?;
    }
    if request.no_merge {
        store.add_label(bead_id, "no-merge:true").await?;
    }
    if let Some(strategy) = request.merge_strategy {
        store.add_label(bead_id, &format!("merge-strategy:{strategy}")).await?;
    }
    if convoy_owned {
        store.add_label(bead_id, "convoy-owned:true").await?;
    }
    Ok(())
}

async fn wake_rig(backend: &Arc<dyn Backend>, rig: &str) {
    let witness = format!("gt-{rig}-witness");
    if let Err(err) = backend.nudge(&witness, "boot").await {
        tracing::warn!(rig, %err, "failed to wake rig witness");
    }
}
