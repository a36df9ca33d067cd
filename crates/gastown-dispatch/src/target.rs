//! Step 3 of the sling pipeline: classify a raw target string.

use gastown_core::bead::Bead;
use gastown_core::store::IssueStore;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A rig name: spawn a fresh polecat into it.
    Rig(String),
    /// An agent bead that already exists; re-hooks it.
    ExistingAgent(String),
    /// `crew/<rig>/<name>`: spawn or repair a named, long-lived worker.
    Crew { rig: String, name: String },
    /// The town-scoped dog pool: resolves to the next idle dog agent.
    DogPool,
    /// A caller-supplied agent ID with no backing bead, used verbatim.
    LiteralAgentId(String),
}

const DOG_POOL_ALIASES: [&str; 2] = ["dog-pool", "dog"];

/// Classify `raw` against the store. An existing bead of type `agent`
/// is an `ExistingAgent`; an existing bead of any other type is
/// nonsensical as a dispatch target and is reported as invalid by the
/// caller, not here — this function only distinguishes shapes.
pub async fn classify(store: &dyn IssueStore, raw: &str) -> Result<Target> {
    if DOG_POOL_ALIASES.contains(&raw) {
        return Ok(Target::DogPool);
    }

    if let Some(rest) = raw.strip_prefix("crew/") {
        return match rest.split_once('/') {
            Some((rig, name)) if !rig.is_empty() && !name.is_empty() => {
                Ok(Target::Crew { rig: rig.to_string(), name: name.to_string() })
            }
            _ => Err(gastown_core::error::Error::Invalid(format!("malformed crew target: {raw}")).into()),
        };
    }

    match store.show(raw).await {
        Ok(bead) if bead.bead_type == "agent" => Ok(Target::ExistingAgent(bead.id)),
        Ok(_) => Ok(Target::LiteralAgentId(raw.to_string())),
        Err(_) => Ok(Target::Rig(raw.to_string())),
    }
}

/// Resolve the town-scoped dog pool to the next idle dog's bead ID: the
/// first dog-role agent record with no bead currently hooked to it.
pub async fn next_idle_dog(store: &dyn IssueStore) -> Result<Bead> {
    use gastown_core::bead::RoleType;
    use gastown_core::store::BeadFilter;

    let beads = store.list(&BeadFilter { bead_type: Some("agent".to_string()), ..BeadFilter::default() }).await?;
    beads
        .into_iter()
        .find(|b| b.role_type == Some(RoleType::Dog) && b.hook_bead.is_none())
        .ok_or_else(|| gastown_core::error::Error::Invalid("no idle dog available".to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gastown_core::store::InMemoryIssueStore;

    #[tokio::test]
    async fn dog_pool_aliases_classify_as_dog_pool() {
        let store = InMemoryIssueStore::new();
        assert_eq!(classify(&store, "dog-pool").await.unwrap(), Target::DogPool);
        assert_eq!(classify(&store, "dog").await.unwrap(), Target::DogPool);
    }

    #[tokio::test]
    async fn crew_target_splits_rig_and_name() {
        let store = InMemoryIssueStore::new();
        let target = classify(&store, "crew/rigA/Scout").await.unwrap();
        assert_eq!(target, Target::Crew { rig: "rigA".to_string(), name: "Scout".to_string() });
    }

    #[tokio::test]
    async fn malformed_crew_target_is_invalid() {
        let store = InMemoryIssueStore::new();
        let err = classify(&store, "crew/rigA").await.unwrap_err();
        assert_eq!(err.kind(), gastown_core::ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn unknown_name_classifies_as_a_rig() {
        let store = InMemoryIssueStore::new();
        assert_eq!(classify(&store, "rigA").await.unwrap(), Target::Rig("rigA".to_string()));
    }

    #[tokio::test]
    async fn existing_agent_bead_classifies_as_existing_agent() {
        let store = InMemoryIssueStore::new();
        store.create_or_reopen_agent("gt-1", "Alpha", &Default::default()).await.unwrap();
        assert_eq!(classify(&store, "gt-1").await.unwrap(), Target::ExistingAgent("gt-1".to_string()));
    }
}
