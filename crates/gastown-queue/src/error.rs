//! Merge-queue errors: passthrough of the core taxonomy — every
//! scheduler failure bottoms out in a store call, a verification-gate
//! rejection, or a malformed heartbeat/config read.

use gastown_core::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Error, Clone)]
pub enum QueueError {
    #[error(transparent)]
    Core(#[from] gastown_core::Error),
}

impl QueueError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
        }
    }
}
