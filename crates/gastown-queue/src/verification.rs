//! The verification gate that guards protected-branch merges: submit the
//! MR to a verification runtime, then map its response to a merge
//! decision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use gastown_core::config::VerificationConfig;
use gastown_core::error::Error;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    NeedsHuman,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub verdict: Verdict,
    pub confidence: u8,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    /// Model family the verifier ran under, used to check the
    /// independent-verifier requirement.
    pub model_family: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Verified,
    Rejected,
    NeedsReview,
}

/// A verification runtime: something that can judge a merge request.
/// Remote in production, a canned responder in tests.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Model family this verifier runs under (e.g. `"claude"`, `"gpt"`).
    fn model_family(&self) -> &str;

    async fn verify(&self, mr_bead_id: &str, diff_summary: &str) -> Result<VerificationResponse>;
}

/// Run the gate: fails fast on the independent-verifier precondition,
/// then maps the verdict per the fixed rule — verified requires pass
/// *and* confidence at or above the threshold; any fail is rejected;
/// needs-human or pass-below-threshold is needs-review.
pub async fn run_gate(
    verifier: &dyn Verifier,
    worker_model_family: &str,
    mr_bead_id: &str,
    diff_summary: &str,
    config: &VerificationConfig,
) -> Result<(GateOutcome, VerificationResponse)> {
    if config.require_independent_verifier && verifier.model_family() == worker_model_family {
        return Err(Error::VerificationRequired(mr_bead_id.to_string()).into());
    }

    let response = verifier.verify(mr_bead_id, diff_summary).await?;
    let outcome = classify(&response, config.confidence_threshold);
    Ok((outcome, response))
}

#[must_use]
pub fn classify(response: &VerificationResponse, threshold: u8) -> GateOutcome {
    match response.verdict {
        Verdict::Fail => GateOutcome::Rejected,
        Verdict::NeedsHuman => GateOutcome::NeedsReview,
        Verdict::Pass if response.confidence >= threshold => GateOutcome::Verified,
        Verdict::Pass => GateOutcome::NeedsReview,
    }
}
