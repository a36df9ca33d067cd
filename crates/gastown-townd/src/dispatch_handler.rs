//! The town process's single dispatch-request handler: a sequential
//! consumer over a channel of dispatch jobs, so "drain in-flight
//! dispatches on shutdown" just means close the channel and let the
//! consumer finish whatever it already pulled off the queue.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use gastown_backend::Backend;
use gastown_core::config::RigSettings;
use gastown_core::store::IssueStore;
use gastown_dispatch::{sling, DispatchRequest, FormulaEngine, Mailer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// An owned, queueable stand-in for [`DispatchRequest`], whose fields
/// borrow from the caller.
#[derive(Debug)]
pub struct DispatchJob {
    pub bead_id: String,
    pub target: String,
    pub dispatcher: String,
    pub args: String,
    pub no_merge: bool,
    pub merge_strategy: Option<String>,
    pub convoy: Option<String>,
    pub no_convoy: bool,
    pub raw: bool,
    pub force: bool,
}

impl DispatchJob {
    fn as_request(&self) -> DispatchRequest<'_> {
        DispatchRequest {
            bead_id: &self.bead_id,
            target: &self.target,
            dispatcher: &self.dispatcher,
            args: &self.args,
            no_merge: self.no_merge,
            merge_strategy: self.merge_strategy.as_deref(),
            convoy: self.convoy.as_deref(),
            no_convoy: self.no_convoy,
            raw: self.raw,
            force: self.force,
            execution_target: None,
        }
    }
}

#[derive(Clone)]
pub struct DispatchHandle {
    #[allow(dead_code)]
    sender: mpsc::Sender<DispatchJob>,
}

impl DispatchHandle {
    #[allow(dead_code)]
    pub async fn submit(&self, job: DispatchJob) -> Result<(), mpsc::error::SendError<DispatchJob>> {
        self.sender.send(job).await
    }
}

/// Spawn the handler task. Dropping every clone of the returned
/// [`DispatchHandle`] closes the channel; the returned [`JoinHandle`]
/// resolves once the handler has finished whatever was already queued.
pub fn spawn(
    store: Arc<dyn IssueStore>,
    backend: Arc<dyn Backend>,
    formula: Arc<dyn FormulaEngine>,
    mailer: Arc<dyn Mailer>,
    town_root: PathBuf,
    rig_settings: Arc<HashMap<String, RigSettings>>,
) -> (DispatchHandle, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel::<DispatchJob>(256);

    let task = tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            let rig_guess = job.target.clone();
            let settings = rig_settings.get(&rig_guess).cloned().unwrap_or_default();
            let request = job.as_request();
            match sling(&*store, &backend, &*formula, &*mailer, &town_root, &settings, &request).await {
                Ok(outcome) => {
                    tracing::info!(bead = %outcome.hooked_bead_id, agent = %outcome.agent_id, "dispatch job completed");
                }
                Err(err) => {
                    tracing::warn!(bead = %job.bead_id, target = %job.target, error = %err, "dispatch job failed");
                }
            }
        }
        tracing::info!("dispatch handler drained, exiting");
    });

    (DispatchHandle { sender }, task)
}
