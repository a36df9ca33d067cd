//! Value types shared by every [`crate::Backend`] variant.

use std::collections::BTreeMap;

use gastown_core::AgentState;
use serde::{Deserialize, Serialize};

/// Which kind of backend drives a session; carried on the [`crate::Backend`]
/// trait object's owner (the registry's `Session` record), not on the
/// trait itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendKind {
    LocalMultiplexer,
    RemoteAgent,
    RemoteExec,
}

/// `GET /api/v1/status` response shape (remote agent wire protocol).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub process_state: String,
    pub uptime_secs: u64,
}

/// Environment snapshot passed to `switch_session`.
pub type EnvMap = BTreeMap<String, String>;

/// A single captured state-stream event from `/ws/state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    State { state: AgentState },
    Exit { code: Option<i32> },
}
