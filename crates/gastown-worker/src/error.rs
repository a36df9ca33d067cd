//! Worker-manager errors: passthrough of the core taxonomy plus the
//! backend taxonomy, since repairing a stale worker touches both the
//! issue store and the session backend.

use gastown_core::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Debug, Error, Clone)]
pub enum WorkerError {
    #[error(transparent)]
    Core(#[from] gastown_core::Error),

    #[error(transparent)]
    Backend(#[from] gastown_backend::BackendError),
}

impl WorkerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
            Self::Backend(err) => err.kind(),
        }
    }
}
