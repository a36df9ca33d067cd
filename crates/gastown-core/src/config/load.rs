//! Loading town and rig settings from the filesystem layout.

use std::path::Path;

use crate::error::Result;
use crate::rig::{RigPaths, TownRoot};

use super::env::apply_town_overrides;
use super::types::{RigSettings, TownSettings};

/// Load town settings from `<town>/.gastown/settings.json`, falling back
/// to defaults if the file does not exist, then apply the `GT_*`
/// town-scoped environment overrides on top.
pub fn load_town_settings(town: &TownRoot) -> Result<TownSettings> {
    let mut settings: TownSettings = load_json_or_default(&town.town_settings_path())?;
    apply_town_overrides(&mut settings);
    Ok(settings)
}

/// Load per-rig settings from `<rig>/settings/config.json`, falling back
/// to an empty override set (fully inherits town settings) if absent.
pub fn load_rig_settings(rig: &RigPaths) -> Result<RigSettings> {
    load_json_or_default(&rig.settings_path())
}

fn load_json_or_default<T>(path: &Path) -> Result<T>
where
    T: Default + serde::de::DeserializeOwned,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
