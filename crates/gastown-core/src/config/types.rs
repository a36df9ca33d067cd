//! Configuration types for town and rig settings.

use serde::{Deserialize, Serialize};

/// Scoring weights for the merge-queue scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueueWeights {
    pub base: f64,
    pub priority: f64,
    pub convoy: f64,
    pub mr_age: f64,
    pub retry: f64,
    pub retry_max: f64,
}

impl Default for QueueWeights {
    fn default() -> Self {
        Self {
            base: 1000.0,
            priority: 100.0,
            convoy: 10.0,
            mr_age: 1.0,
            retry: 50.0,
            retry_max: 300.0,
        }
    }
}

/// Whether an independent (different-model-family) verifier is required
/// before a protected-branch merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub require_independent_verifier: bool,
    pub confidence_threshold: u8,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            require_independent_verifier: false,
            confidence_threshold: 80,
        }
    }
}

/// Settings that apply to the whole town unless a rig overrides them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TownSettings {
    pub protected_branches: Vec<String>,
    pub queue_weights: QueueWeights,
    pub verification: VerificationConfig,
    pub health_check_workers: usize,
    pub health_check_timeout_secs: u64,
}

impl Default for TownSettings {
    fn default() -> Self {
        Self {
            protected_branches: Vec::new(),
            queue_weights: QueueWeights::default(),
            verification: VerificationConfig::default(),
            health_check_workers: 10,
            health_check_timeout_secs: 5,
        }
    }
}

/// Per-rig overrides layered on top of [`TownSettings`].
///
/// `protected_branches: None` inherits the town list; `Some(vec![])`
/// explicitly disables protection for this rig; `Some(non_empty)`
/// replaces the town list entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigSettings {
    pub protected_branches: Option<Vec<String>>,
    pub queue_weights: Option<QueueWeights>,
    pub verification: Option<VerificationConfig>,
    pub execution_target: Option<ExecutionTarget>,
}

/// Where a worker is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionTarget {
    Local,
    K8s,
}
