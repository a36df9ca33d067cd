//! The fourth config tier: `GT_*` environment variables, applied after
//! town and rig settings have already merged. This is strictly the last
//! word in the defaults -> town -> rig -> env precedence chain.

use super::merge::EffectiveRigSettings;
use super::types::{ExecutionTarget, TownSettings};

/// Overrides the settings scoped to a single rig's effective
/// configuration: protected branches, queue weights, and verification.
/// Call this after [`TownSettings::effective_for_rig`].
pub fn apply_rig_overrides(effective: &mut EffectiveRigSettings) {
    if let Some(branches) = env_list("GT_PROTECTED_BRANCHES") {
        effective.protected_branches = branches;
    }

    let weights = &mut effective.queue_weights;
    apply_f64(&mut weights.base, "GT_QUEUE_WEIGHT_BASE");
    apply_f64(&mut weights.priority, "GT_QUEUE_WEIGHT_PRIORITY");
    apply_f64(&mut weights.convoy, "GT_QUEUE_WEIGHT_CONVOY");
    apply_f64(&mut weights.mr_age, "GT_QUEUE_WEIGHT_MR_AGE");
    apply_f64(&mut weights.retry, "GT_QUEUE_WEIGHT_RETRY");
    apply_f64(&mut weights.retry_max, "GT_QUEUE_WEIGHT_RETRY_MAX");

    if let Some(flag) = env_bool("GT_VERIFICATION_REQUIRE_INDEPENDENT") {
        effective.verification.require_independent_verifier = flag;
    }
    if let Some(threshold) = env_u8("GT_VERIFICATION_CONFIDENCE_THRESHOLD") {
        effective.verification.confidence_threshold = threshold;
    }
}

/// Overrides the settings scoped to the whole town rather than a single
/// rig. Call this after [`load_town_settings`](super::load_town_settings).
pub fn apply_town_overrides(town: &mut TownSettings) {
    if let Some(workers) = env_usize("GT_HEALTH_CHECK_WORKERS") {
        town.health_check_workers = workers;
    }
}

/// The execution-target override a caller should fall back to once an
/// explicit CLI flag and the rig's own setting have both come up empty.
pub fn execution_target_override() -> Option<ExecutionTarget> {
    std::env::var("GT_K8S").ok().filter(|v| v == "1").map(|_| ExecutionTarget::K8s)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key)
        .ok()
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn env_u8(key: &str) -> Option<u8> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn apply_f64(field: &mut f64, key: &str) {
    if let Ok(raw) = std::env::var(key) {
        if let Ok(value) = raw.parse() {
            *field = value;
        }
    }
}
