//! Shared types and primitives used across every Gas Town crate: the bead
//! data model, convoys and merge requests, mailbox envelopes, the town/rig
//! filesystem layout, configuration loading, the issue-store contract, and
//! the subprocess helper everything shells out to `bd`/`git` through.

pub mod bead;
pub mod config;
pub mod convoy;
pub mod error;
pub mod fields;
pub mod mailbox;
pub mod merge_request;
pub mod process;
pub mod rig;
pub mod store;

pub use bead::{AgentState, Bead, BeadStatus, CloseReason, Labels, RoleType};
pub use convoy::{Convoy, MergeStrategy};
pub use error::{Error, ErrorKind, Result};
pub use mailbox::{DeliveryState, Envelope, MailPriority};
pub use merge_request::{MergeRequest, MrStatus};
pub use rig::{RigPaths, TownRoot};
pub use store::{BdIssueStore, BeadFilter, InMemoryIssueStore, IssueStore, MergeSlotStatus, UpdateFields};
