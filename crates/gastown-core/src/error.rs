//! Error taxonomy shared by every Gas Town core crate.
//!
//! Every fallible operation in the core returns [`Result<T>`]. Callers that
//! need to branch on *kind* rather than match a specific variant shape
//! (dispatch, the scheduler, anything crossing the `not_supported` backend
//! boundary) use [`Error::kind`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The result type for Gas Town core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error classification, independent of the variant's payload shape.
///
/// This is the taxonomy from the error-handling design: callers match on
/// `kind()` instead of the `Error` enum directly so that adding context to
/// a variant never breaks a caller's branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    BeadNotFound,
    BeadClosed,
    BeadAlreadyHooked,
    RateLimited,
    WorktreeInvalid,
    WorktreeDirty,
    WorkerHasOpenMr,
    DagCycle,
    DagMissingParent,
    DagHasDependents,
    GitRebaseFailed,
    GitMergeFailed,
    StoreUnavailable,
    StoreTimeout,
    VerificationRequired,
    VerificationRejected,
    VerificationNeedsReview,
    NotSupported,
    /// Caller input was malformed in a way none of the above kinds cover
    /// (e.g. an empty bead ID). Not one of the named error kinds proper,
    /// but needed so validation failures don't get misclassified as one
    /// of them.
    Invalid,
}

/// Errors raised across dispatch, the branch DAG, the merge-queue
/// scheduler, the session registry and the worker manager.
#[derive(Debug, Error, Clone)]
pub enum Error {
    #[error("bead not found: {0}")]
    BeadNotFound(String),

    #[error("bead is closed: {0}")]
    BeadClosed(String),

    #[error("bead already hooked to {hooked_to}: {bead}")]
    BeadAlreadyHooked { bead: String, hooked_to: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("worktree invalid at {path}: {reason}")]
    WorktreeInvalid { path: String, reason: String },

    #[error("worktree dirty at {path} (use --force)")]
    WorktreeDirty { path: String },

    #[error("worker {worker} has an open merge request for branch {branch} (use nuke --force)")]
    WorkerHasOpenMr { worker: String, branch: String },

    #[error("dag contains a cycle: {0}")]
    DagCycle(String),

    #[error("dag node {node} references missing parent {parent}")]
    DagMissingParent { node: String, parent: String },

    #[error("dag node {0} has children and cannot be removed")]
    DagHasDependents(String),

    #[error("git rebase failed: {0}")]
    GitRebaseFailed(String),

    #[error("git merge failed: {0}")]
    GitMergeFailed(String),

    #[error("issue store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("issue store call timed out after {0:?}")]
    StoreTimeout(Duration),

    #[error("verification required before merging {0}")]
    VerificationRequired(String),

    #[error("verification rejected: {0}")]
    VerificationRejected(String),

    #[error("verification needs human review: {0}")]
    VerificationNeedsReview(String),

    #[error("backend {backend} does not support {capability}")]
    NotSupported {
        backend: String,
        capability: String,
    },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Project this error onto its stable [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BeadNotFound(_) => ErrorKind::BeadNotFound,
            Self::BeadClosed(_) => ErrorKind::BeadClosed,
            Self::BeadAlreadyHooked { .. } => ErrorKind::BeadAlreadyHooked,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::WorktreeInvalid { .. } => ErrorKind::WorktreeInvalid,
            Self::WorktreeDirty { .. } => ErrorKind::WorktreeDirty,
            Self::WorkerHasOpenMr { .. } => ErrorKind::WorkerHasOpenMr,
            Self::DagCycle(_) => ErrorKind::DagCycle,
            Self::DagMissingParent { .. } => ErrorKind::DagMissingParent,
            Self::DagHasDependents(_) => ErrorKind::DagHasDependents,
            Self::GitRebaseFailed(_) => ErrorKind::GitRebaseFailed,
            Self::GitMergeFailed(_) => ErrorKind::GitMergeFailed,
            Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Self::StoreTimeout(_) => ErrorKind::StoreTimeout,
            Self::VerificationRequired(_) => ErrorKind::VerificationRequired,
            Self::VerificationRejected(_) => ErrorKind::VerificationRejected,
            Self::VerificationNeedsReview(_) => ErrorKind::VerificationNeedsReview,
            Self::NotSupported { .. } => ErrorKind::NotSupported,
            Self::Invalid(_) | Self::Parse(_) => ErrorKind::Invalid,
            Self::Io(_) => ErrorKind::StoreUnavailable,
        }
    }

    /// True for transient classes a caller should retry with jittered
    /// backoff rather than surface to the operator.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::StoreUnavailable | ErrorKind::StoreTimeout)
    }

    #[must_use]
    pub fn not_supported(backend: impl fmt::Display, capability: impl fmt::Display) -> Self {
        Self::NotSupported {
            backend: backend.to_string(),
            capability: capability.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_projection_is_stable() {
        let err = Error::BeadAlreadyHooked {
            bead: "gt-1".into(),
            hooked_to: "rigA/polecats/Alpha".into(),
        };
        assert_eq!(err.kind(), ErrorKind::BeadAlreadyHooked);
    }

    #[test]
    fn not_supported_carries_backend_and_capability() {
        let err = Error::not_supported("LocalMultiplexer", "respawn");
        assert_eq!(err.kind(), ErrorKind::NotSupported);
        assert!(err.to_string().contains("LocalMultiplexer"));
        assert!(err.to_string().contains("respawn"));
    }

    #[test]
    fn store_errors_are_transient() {
        assert!(Error::StoreUnavailable("down".into()).is_transient());
        assert!(Error::StoreTimeout(Duration::from_secs(30)).is_transient());
        assert!(!Error::BeadNotFound("gt-1".into()).is_transient());
    }
}
