//! Merge-request priority scoring: the anti-starvation formula that
//! ranks a rig's open merge requests.

use chrono::{DateTime, Utc};

use gastown_core::config::QueueWeights;
use gastown_core::convoy::Convoy;
use gastown_core::merge_request::MergeRequest;

/// `score = BASE + max(0, 4-priority)*W_pri + convoy_age_hours*W_convoy
/// + mr_age_hours*W_mr - min(retry_count*W_retry, W_retry_max)`.
///
/// `priority` is the owning bead's priority (0 = highest); `convoy` is
/// `None` when the MR has no convoy, which scores `convoy_age_hours` as
/// zero.
#[must_use]
pub fn score(mr: &MergeRequest, priority: u8, convoy: Option<&Convoy>, weights: &QueueWeights, now: DateTime<Utc>) -> f64 {
    let priority_term = f64::from(4u8.saturating_sub(priority)) * weights.priority;
    let convoy_age_hours = convoy.map_or(0.0, |c| c.age_hours(now));
    let convoy_term = convoy_age_hours * weights.convoy;
    let mr_term = mr.age_hours(now) * weights.mr_age;
    let retry_penalty = (f64::from(mr.retry_count) * weights.retry).min(weights.retry_max);

    weights.base + priority_term + convoy_term + mr_term - retry_penalty
}

/// Rank MRs descending by score, ties broken by bead ID ascending.
#[must_use]
pub fn rank<'a>(
    entries: &'a [(MergeRequest, u8, Option<Convoy>)],
    weights: &QueueWeights,
    now: DateTime<Utc>,
) -> Vec<&'a MergeRequest> {
    let mut scored: Vec<(&MergeRequest, f64)> = entries
        .iter()
        .map(|(mr, priority, convoy)| (mr, score(mr, *priority, convoy.as_ref(), weights, now)))
        .collect();
    scored.sort_by(|(a_mr, a_score), (b_mr, b_score)| {
        b_score
            .partial_cmp(a_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a_mr.bead_id.cmp(&b_mr.bead_id))
    });
    scored.into_iter().map(|(mr, _)| mr).collect()
}
