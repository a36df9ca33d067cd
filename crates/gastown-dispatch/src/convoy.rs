//! Step 4 of the sling pipeline: convoy membership.

use chrono::Utc;

use gastown_core::bead::Bead;
use gastown_core::store::IssueStore;

use crate::error::Result;

const CONVOY_LABEL_PREFIX: &str = "convoy:";

fn existing_convoy_id(bead: &Bead) -> Option<String> {
    bead.labels.iter().find_map(|l| l.strip_prefix(CONVOY_LABEL_PREFIX)).map(str::to_string)
}

/// Apply convoy membership: an explicit `--convoy` wins, then an
/// existing membership is reused, then a fresh auto-convoy is minted.
/// `--no-convoy` suppresses all of it and returns `None`.
pub async fn resolve(store: &dyn IssueStore, bead: &Bead, explicit: Option<&str>, no_convoy: bool) -> Result<Option<String>> {
    if no_convoy {
        return Ok(None);
    }
    if let Some(id) = explicit {
        store.add_label(&bead.id, &format!("{CONVOY_LABEL_PREFIX}{id}")).await?;
        return Ok(Some(id.to_string()));
    }
    if let Some(id) = existing_convoy_id(bead) {
        return Ok(Some(id));
    }
    let id = format!("convoy-{}-{}", bead.id, Utc::now().timestamp_millis());
    store.add_label(&bead.id, &format!("{CONVOY_LABEL_PREFIX}{id}")).await?;
    Ok(Some(id))
}
