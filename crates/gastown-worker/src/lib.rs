//! Worker (polecat/crew) manager: name allocation, worktree safety gates,
//! rate-limit backoff, and the agent-bead bookkeeping a spawn or repair
//! writes.

pub mod backoff;
pub mod error;
pub mod manager;
pub mod names;
pub mod worktree;

pub use backoff::Backoff;
pub use error::{Result, WorkerError};
pub use manager::{spawn_crew, spawn_polecat, Worker};
