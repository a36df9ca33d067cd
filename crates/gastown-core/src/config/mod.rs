//! Configuration: town/rig settings and their precedence.
//!
//! Resolution walks a four-tier hierarchy: built-in defaults, then town
//! settings, then rig settings, then `GT_*` environment variables, each
//! tier overriding only what the previous one left unset.

mod env;
mod load;
mod merge;
mod types;

pub use env::{apply_rig_overrides, apply_town_overrides, execution_target_override};
pub use load::{load_rig_settings, load_town_settings};
pub use merge::EffectiveRigSettings;
pub use types::{ExecutionTarget, QueueWeights, RigSettings, TownSettings, VerificationConfig};
