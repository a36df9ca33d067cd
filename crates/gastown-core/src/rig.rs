//! Town/rig filesystem layout.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// The town root directory, resolved from `GT_ROOT` or by walking up from
/// the caller's cwd looking for `.beads/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TownRoot(PathBuf);

impl TownRoot {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn resolve(cwd: &Path) -> Result<Self> {
        if let Ok(env_root) = std::env::var("GT_ROOT") {
            let path = PathBuf::from(env_root);
            if path.join(".beads").is_dir() {
                return Ok(Self(path));
            }
            return Err(Error::Invalid(format!(
                "GT_ROOT={} has no .beads directory",
                path.display()
            )));
        }

        let mut dir = cwd.to_path_buf();
        loop {
            if dir.join(".beads").is_dir() {
                return Ok(Self(dir));
            }
            if !dir.pop() {
                return Err(Error::Invalid(
                    "could not find a town root (no .beads directory above cwd)".to_string(),
                ));
            }
        }
    }

    #[must_use]
    pub fn mayor_dir(&self) -> PathBuf {
        self.0.join("mayor")
    }

    #[must_use]
    pub fn deacon_dir(&self) -> PathBuf {
        self.0.join("deacon")
    }

    #[must_use]
    pub fn town_dag_path(&self) -> PathBuf {
        self.0.join(".gastown").join("branch-dag.json")
    }

    #[must_use]
    pub fn town_settings_path(&self) -> PathBuf {
        self.0.join(".gastown").join("settings.json")
    }

    #[must_use]
    pub fn rig(&self, name: &str) -> RigPaths {
        RigPaths {
            root: self.0.join(name),
            name: name.to_string(),
        }
    }
}

/// Paths within a single rig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigPaths {
    root: PathBuf,
    name: String,
}

impl RigPaths {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn polecats_dir(&self) -> PathBuf {
        self.root.join("polecats")
    }

    #[must_use]
    pub fn polecat_worktree(&self, name: &str) -> PathBuf {
        self.polecats_dir().join(name)
    }

    #[must_use]
    pub fn crew_dir(&self) -> PathBuf {
        self.root.join("crew")
    }

    #[must_use]
    pub fn crew_worktree(&self, name: &str) -> PathBuf {
        self.crew_dir().join(name)
    }

    #[must_use]
    pub fn witness_dir(&self) -> PathBuf {
        self.root.join("witness")
    }

    #[must_use]
    pub fn refinery_dir(&self) -> PathBuf {
        self.root.join("refinery")
    }

    #[must_use]
    pub fn heartbeat_path(&self) -> PathBuf {
        self.refinery_dir().join("heartbeat.json")
    }

    #[must_use]
    pub fn refinery_runtime_path(&self) -> PathBuf {
        self.refinery_dir().join(".runtime").join("refinery.json")
    }

    #[must_use]
    pub fn dag_path(&self) -> PathBuf {
        self.root.join(".gastown").join("branch-dag.json")
    }

    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings").join("config.json")
    }

    #[must_use]
    pub fn beads_dir(&self) -> PathBuf {
        self.root.join(".beads")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    #[serial(gt_root_env)]
    fn resolve_walks_up_to_beads_dir() {
        let dir = tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".beads")).expect("mkdir");
        let nested = dir.path().join("rigA").join("polecats").join("Alpha");
        std::fs::create_dir_all(&nested).expect("mkdir nested");

        std::env::remove_var("GT_ROOT");
        let root = TownRoot::resolve(&nested).expect("resolve");
        assert_eq!(root.path(), dir.path());
    }

    #[test]
    #[serial(gt_root_env)]
    fn rig_paths_match_layout() {
        let dir = tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".beads")).expect("mkdir");
        std::env::remove_var("GT_ROOT");
        let root = TownRoot::resolve(dir.path()).expect("resolve");
        let rig = root.rig("rigA");
        assert_eq!(rig.polecat_worktree("Alpha"), dir.path().join("rigA/polecats/Alpha"));
        assert_eq!(rig.heartbeat_path(), dir.path().join("rigA/refinery/heartbeat.json"));
    }
}
