//! The scheduler's heartbeat file: one JSON document per rig, rewritten
//! atomically every cycle so a supervising daemon can judge liveness.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gastown_core::error::Error;

use crate::error::Result;

const FRESH_BOUND: Duration = Duration::from_secs(5 * 60);
const STALE_BOUND: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    VeryStale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub timestamp: DateTime<Utc>,
    pub cycle: u64,
    pub last_action: String,
    pub queue_len: usize,
    pub processed_count: usize,
}

impl Heartbeat {
    #[must_use]
    pub fn next(previous: Option<&Self>, last_action: impl Into<String>, queue_len: usize, processed_count: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            cycle: previous.map_or(0, |h| h.cycle + 1),
            last_action: last_action.into(),
            queue_len,
            processed_count,
        }
    }

    #[must_use]
    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        let age = (now - self.timestamp).to_std().unwrap_or(Duration::ZERO);
        if age < FRESH_BOUND {
            Freshness::Fresh
        } else if age < STALE_BOUND {
            Freshness::Stale
        } else {
            Freshness::VeryStale
        }
    }

    pub async fn read(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(Error::from)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::from(err).into()),
        }
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(Error::from)?;
        }
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(self).map_err(Error::from)?;
        tokio::fs::write(&tmp, bytes).await.map_err(Error::from)?;
        tokio::fs::rename(&tmp, path).await.map_err(Error::from)?;
        Ok(())
    }
}
