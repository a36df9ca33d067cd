//! The uniform backend abstraction: one capability trait implemented by a
//! local terminal multiplexer, a remote HTTP/WebSocket agent sidecar, and
//! a secure-shell tunnel to a remote multiplexer.

pub mod error;
pub mod local;
mod nudge;
pub mod remote_agent;
pub mod remote_exec;
mod trait_def;
pub mod types;

pub use error::{BackendError, Result};
pub use local::LocalMultiplexer;
pub use remote_agent::RemoteAgent;
pub use remote_exec::RemoteExec;
pub use trait_def::Backend;
pub use types::{BackendKind, EnvMap, ProcessStatus, StateEvent};
