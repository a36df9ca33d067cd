//! Per-rig rate-limit backoff: a durable counter persisted as JSON next to
//! the rig's settings, advanced on spawn errors the session manager
//! classifies as rate-limited.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gastown_core::error::{Error, Result};

const BASE_DELAY_SECS: u64 = 30;
const MAX_DELAY_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BackoffState {
    strikes: u32,
    until: DateTime<Utc>,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self { strikes: 0, until: Utc::now() }
    }
}

/// A rig's rate-limit backoff counter, durable across process restarts.
#[derive(Debug, Clone)]
pub struct Backoff {
    path: PathBuf,
}

impl Backoff {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read(&self) -> BackoffState {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => BackoffState::default(),
        }
    }

    async fn write(&self, state: &BackoffState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// `Err(RateLimited)` when still in a backoff window; `Ok(())`
    /// otherwise. Callers check this before attempting a spawn.
    pub async fn check(&self) -> Result<()> {
        let state = self.read().await;
        let now = Utc::now();
        if now < state.until {
            let retry_after = (state.until - now).to_std().unwrap_or(Duration::ZERO);
            return Err(Error::RateLimited { retry_after });
        }
        Ok(())
    }

    /// Record a rate-limited spawn failure: doubles the delay (capped)
    /// from the base and extends the backoff window.
    pub async fn strike(&self) -> Result<Duration> {
        let mut state = self.read().await;
        state.strikes += 1;
        let delay_secs = BASE_DELAY_SECS.saturating_mul(1u64 << state.strikes.min(20)).min(MAX_DELAY_SECS);
        let delay = Duration::from_secs(delay_secs);
        state.until = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        self.write(&state).await?;
        Ok(delay)
    }

    /// Reset the counter after a clean spawn.
    pub async fn reset(&self) -> Result<()> {
        self.write(&BackoffState::default()).await
    }
}

#[must_use]
pub fn path_for_rig(rig_root: &Path) -> PathBuf {
    rig_root.join(".gastown").join("rate-limit.json")
}
