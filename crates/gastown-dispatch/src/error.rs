//! Dispatch errors: passthrough of the core, backend, and worker
//! taxonomies plus nothing of its own — every failure in the sling
//! pipeline bottoms out in one of those three.

use gastown_core::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, Error, Clone)]
pub enum DispatchError {
    #[error(transparent)]
    Core(#[from] gastown_core::Error),

    #[error(transparent)]
    Backend(#[from] gastown_backend::BackendError),

    #[error(transparent)]
    Worker(#[from] gastown_worker::WorkerError),
}

impl DispatchError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
            Self::Backend(err) => err.kind(),
            Self::Worker(err) => err.kind(),
        }
    }
}
