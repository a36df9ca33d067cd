//! Backend-layer errors: network/process failures particular to driving a
//! terminal multiplexer or a remote agent sidecar, plus passthrough of the
//! core taxonomy for everything else.

use gastown_core::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Error, Clone)]
pub enum BackendError {
    #[error(transparent)]
    Core(#[from] gastown_core::Error),

    #[error("http request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("websocket to {url} failed: {reason}")]
    WebSocket { url: String, reason: String },

    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
            Self::Http { .. } | Self::WebSocket { .. } => ErrorKind::StoreUnavailable,
            Self::Malformed(_) => ErrorKind::Invalid,
        }
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::StoreUnavailable | ErrorKind::StoreTimeout)
    }
}
