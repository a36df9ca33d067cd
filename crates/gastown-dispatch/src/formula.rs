//! Step 5 of the sling pipeline: formula auto-apply. The molecule/formula
//! templating runtime itself is out of scope; this is the narrow seam the
//! pipeline calls through, mirroring `gastown-dag::Signaler`'s
//! capability-trait shape.

use async_trait::async_trait;

use crate::error::Result;

/// Something that can expand a formula template into a tree of beads
/// rooted at a "wisp root".
#[async_trait]
pub trait FormulaEngine: Send + Sync {
    /// Instantiate `mol-polecat-work` on `bead_id`, returning the
    /// wisp-root bead ID that should be hooked instead of the raw bead.
    async fn instantiate_polecat_work(&self, bead_id: &str) -> Result<String>;
}

/// Identity formula engine: returns the raw bead ID unchanged. Used when
/// `--raw` is requested, or as the default where no templating runtime is
/// wired in.
pub struct IdentityFormulaEngine;

#[async_trait]
impl FormulaEngine for IdentityFormulaEngine {
    async fn instantiate_polecat_work(&self, bead_id: &str) -> Result<String> {
        Ok(bead_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identity_engine_returns_the_raw_bead_id() {
        let engine = IdentityFormulaEngine;
        assert_eq!(engine.instantiate_polecat_work("gt-1").await.unwrap(), "gt-1");
    }
}
