//! Registry-layer errors: passthrough of the core taxonomy, since every
//! registry operation bottoms out in an issue-store call or a backend
//! health check.

use gastown_core::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error, Clone)]
pub enum RegistryError {
    #[error(transparent)]
    Core(#[from] gastown_core::Error),

    #[error(transparent)]
    Backend(#[from] gastown_backend::BackendError),
}

impl RegistryError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
            Self::Backend(err) => err.kind(),
        }
    }
}
