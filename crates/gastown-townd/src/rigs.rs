//! Active-rig discovery: the town root has no index of its own rigs, so
//! this walks its immediate subdirectories and treats anything with a
//! `refinery/` directory as a rig (the reserved `mayor`/`deacon` town-level
//! directories and the `.gastown` state directory never have one).

use std::path::Path;

pub fn discover_active_rigs(town_root: &Path) -> Vec<String> {
    let mut rigs = Vec::new();
    let Ok(entries) = std::fs::read_dir(town_root) else {
        return rigs;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path.join("refinery").is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                rigs.push(name.to_string());
            }
        }
    }
    rigs.sort();
    rigs
}
