//! Branch-DAG errors: passthrough of the core taxonomy. Every failure
//! mode the orchestrator raises (cycle, missing parent, dangling
//! children, rebase failure) already has a named core error kind.

use gastown_core::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DagError>;

#[derive(Debug, Error, Clone)]
pub enum DagError {
    #[error(transparent)]
    Core(#[from] gastown_core::Error),
}

impl DagError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
        }
    }
}
