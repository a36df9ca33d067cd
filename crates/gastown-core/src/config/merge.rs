//! Town/rig settings merge (immutable pattern, grounded on the teacher's
//! defaults→global→project→env precedence walk).

use super::types::{RigSettings, TownSettings};

/// The effective settings for one rig: town defaults overridden by
/// whatever the rig explicitly sets.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveRigSettings {
    pub protected_branches: Vec<String>,
    pub queue_weights: super::types::QueueWeights,
    pub verification: super::types::VerificationConfig,
}

impl TownSettings {
    /// Resolves town defaults and a rig's overrides into the settings a
    /// scheduler actually runs with, then applies the `GT_*` environment
    /// tier on top — the last and highest-precedence step in the
    /// defaults -> town -> rig -> env chain.
    #[must_use]
    pub fn effective_for_rig(&self, rig: &RigSettings) -> EffectiveRigSettings {
        let mut effective = EffectiveRigSettings {
            protected_branches: rig
                .protected_branches
                .clone()
                .unwrap_or_else(|| self.protected_branches.clone()),
            queue_weights: rig.queue_weights.unwrap_or(self.queue_weights),
            verification: rig.verification.unwrap_or(self.verification),
        };
        super::env::apply_rig_overrides(&mut effective);
        effective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(gt_env_overrides)]
    fn rig_inherits_town_protected_branches_when_unset() {
        let town = TownSettings {
            protected_branches: vec!["main".to_string()],
            ..TownSettings::default()
        };
        let rig = RigSettings::default();
        assert_eq!(town.effective_for_rig(&rig).protected_branches, vec!["main".to_string()]);
    }

    #[test]
    #[serial(gt_env_overrides)]
    fn rig_empty_list_explicitly_disables_protection() {
        let town = TownSettings {
            protected_branches: vec!["main".to_string()],
            ..TownSettings::default()
        };
        let rig = RigSettings {
            protected_branches: Some(Vec::new()),
            ..RigSettings::default()
        };
        assert!(town.effective_for_rig(&rig).protected_branches.is_empty());
    }

    #[test]
    #[serial(gt_env_overrides)]
    fn rig_nonempty_list_replaces_town_list() {
        let town = TownSettings {
            protected_branches: vec!["main".to_string()],
            ..TownSettings::default()
        };
        let rig = RigSettings {
            protected_branches: Some(vec!["release".to_string()]),
            ..RigSettings::default()
        };
        assert_eq!(town.effective_for_rig(&rig).protected_branches, vec!["release".to_string()]);
    }
}
