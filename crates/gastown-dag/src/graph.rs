//! The branch DAG itself: an arena of nodes keyed by branch name plus a
//! parent→children index, mirroring the "never store raw node handles
//! inside other nodes" rule — every cross-reference is a `String` key.

use std::collections::BTreeMap;

use chrono::Utc;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};

use gastown_core::error::Error;

use crate::error::Result;
use crate::node::{BranchNode, NodeStatus};

/// The branch DAG. `root_children` holds the names of nodes whose parent
/// is the rig/town root (not itself a node).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchDag {
    nodes: BTreeMap<String, BranchNode>,
    children: BTreeMap<String, Vec<String>>,
    root_children: Vec<String>,
}

impl BranchDag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BranchNode> {
        self.nodes.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn children_of(&self, name: Option<&str>) -> &[String] {
        match name {
            None => &self.root_children,
            Some(name) => self.children.get(name).map_or(&[], Vec::as_slice),
        }
    }

    fn children_of_mut(&mut self, name: Option<&str>) -> &mut Vec<String> {
        match name {
            None => &mut self.root_children,
            Some(name) => self.children.entry(name.to_string()).or_default(),
        }
    }

    /// Validates uniqueness and parent existence (unless the parent is
    /// root), then appends to the parent's child list.
    pub fn add(&mut self, node: BranchNode) -> Result<()> {
        if self.nodes.contains_key(&node.name) {
            return Err(Error::Invalid(format!("branch {} already exists", node.name)).into());
        }
        if let Some(parent) = &node.parent {
            if !self.nodes.contains_key(parent) {
                return Err(Error::DagMissingParent {
                    node: node.name.clone(),
                    parent: parent.clone(),
                }
                .into());
            }
        }
        let name = node.name.clone();
        let parent = node.parent.clone();
        self.nodes.insert(name.clone(), node);
        self.children_of_mut(parent.as_deref()).push(name);
        Ok(())
    }

    /// Fails if the node has children.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let node = self.nodes.get(name).ok_or_else(|| Error::BeadNotFound(name.to_string()))?;
        if !self.children_of(Some(name)).is_empty() {
            return Err(Error::DagHasDependents(name.to_string()).into());
        }
        let parent = node.parent.clone();
        self.children_of_mut(parent.as_deref()).retain(|c| c != name);
        self.children.remove(name);
        self.nodes.remove(name);
        Ok(())
    }

    /// Single-writer mutation; bumps `last_updated` after `mutator` runs.
    pub fn update(&mut self, name: &str, mutator: impl FnOnce(&mut BranchNode)) -> Result<()> {
        let node = self.nodes.get_mut(name).ok_or_else(|| Error::BeadNotFound(name.to_string()))?;
        mutator(node);
        node.last_updated = Utc::now();
        Ok(())
    }

    /// Moves `name` to a new parent's child list and marks it
    /// `needs-rebase`.
    pub fn retarget(&mut self, name: &str, new_parent: Option<&str>) -> Result<()> {
        if !self.nodes.contains_key(name) {
            return Err(Error::BeadNotFound(name.to_string()).into());
        }
        if let Some(parent) = new_parent {
            if !self.nodes.contains_key(parent) {
                return Err(Error::DagMissingParent {
                    node: name.to_string(),
                    parent: parent.to_string(),
                }
                .into());
            }
        }
        let old_parent = self.nodes[name].parent.clone();
        self.children_of_mut(old_parent.as_deref()).retain(|c| c != name);
        self.children_of_mut(new_parent).push(name.to_string());

        if let Some(node) = self.nodes.get_mut(name) {
            node.parent = new_parent.map(str::to_string);
            node.status = NodeStatus::NeedsRebase;
            node.last_updated = Utc::now();
        }
        Ok(())
    }

    /// DFS-ordered list of every node, parents before children. Returns a
    /// cycle error if the parent/children edges contain one.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.nodes.keys() {
            graph.add_node(name.as_str());
        }
        for (name, node) in &self.nodes {
            if let Some(parent) = &node.parent {
                graph.add_edge(parent.as_str(), name.as_str(), ());
            }
        }
        toposort(&graph, None)
            .map(|order| order.into_iter().map(str::to_string).collect())
            .map_err(|cycle| Error::DagCycle(cycle.node_id().to_string()).into())
    }

    /// A stable topo-ordered filter of nodes currently `needs-rebase`.
    pub fn rebase_order(&self) -> Result<Vec<String>> {
        let order = self.topological_order()?;
        Ok(order
            .into_iter()
            .filter(|name| self.nodes.get(name).is_some_and(|n| n.status == NodeStatus::NeedsRebase))
            .collect())
    }

    fn descendants(&self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<String> = self.children_of(Some(name)).to_vec();
        while let Some(next) = stack.pop() {
            stack.extend(self.children_of(Some(&next)).iter().cloned());
            out.push(next);
        }
        out
    }

    /// Sets the node's head; walks all transitive descendants, flipping
    /// any currently `clean` to `needs-rebase`. Already-`needs-rebase`/
    /// `conflict` descendants are left untouched (idempotent). Returns
    /// the names of descendants that were flipped, for signaling.
    pub fn mark_updated(&mut self, name: &str, new_head: impl Into<String>) -> Result<Vec<String>> {
        let node = self.nodes.get_mut(name).ok_or_else(|| Error::BeadNotFound(name.to_string()))?;
        node.head_sha = new_head.into();
        node.last_updated = Utc::now();

        let mut flipped = Vec::new();
        for descendant in self.descendants(name) {
            if let Some(node) = self.nodes.get_mut(&descendant) {
                if node.status == NodeStatus::Clean {
                    node.status = NodeStatus::NeedsRebase;
                    node.last_updated = Utc::now();
                    flipped.push(descendant);
                }
            }
        }
        Ok(flipped)
    }

    /// Only direct children of the root whose recorded `base_sha` differs
    /// from `new_root_head` and are currently `clean` flip to
    /// `needs-rebase`. Does not cascade beyond direct children.
    pub fn mark_root_updated(&mut self, new_root_head: &str) -> Vec<String> {
        let mut flipped = Vec::new();
        for name in self.root_children.clone() {
            if let Some(node) = self.nodes.get_mut(&name) {
                if node.status == NodeStatus::Clean && node.base_sha != new_root_head {
                    node.status = NodeStatus::NeedsRebase;
                    node.last_updated = Utc::now();
                    flipped.push(name);
                }
            }
        }
        flipped
    }

    /// Terminal-marks `name` as `merged`; each direct child is retargeted
    /// to `name`'s parent and marked `needs-rebase`.
    pub fn handle_merged(&mut self, name: &str) -> Result<Vec<String>> {
        let parent = self.nodes.get(name).ok_or_else(|| Error::BeadNotFound(name.to_string()))?.parent.clone();
        self.update(name, |n| n.status = NodeStatus::Merged)?;

        let children = self.children_of(Some(name)).to_vec();
        for child in &children {
            self.retarget(child, parent.as_deref())?;
        }
        Ok(children)
    }

    /// Checks children-index/parent-field agreement, no dangling
    /// children, and no cycle.
    pub fn validate(&self) -> Result<()> {
        for (name, node) in &self.nodes {
            let siblings = self.children_of(node.parent.as_deref());
            if !siblings.iter().any(|c| c == name) {
                return Err(Error::Invalid(format!(
                    "node {name} not present in its recorded parent's child list"
                ))
                .into());
            }
        }
        for (parent, kids) in &self.children {
            if !self.nodes.contains_key(parent) {
                return Err(Error::Invalid(format!("dangling children entry for missing node {parent}")).into());
            }
            for kid in kids {
                if !self.nodes.contains_key(kid) {
                    return Err(Error::DagMissingParent {
                        node: kid.clone(),
                        parent: parent.clone(),
                    }
                    .into());
                }
            }
        }
        for kid in &self.root_children {
            if !self.nodes.contains_key(kid) {
                return Err(Error::DagMissingParent {
                    node: kid.clone(),
                    parent: String::new(),
                }
                .into());
            }
        }
        self.topological_order().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, parent: Option<&str>) -> BranchNode {
        BranchNode::new(name, parent.map(str::to_string), "sha0")
    }

    #[test]
    fn add_rejects_missing_parent() {
        let mut dag = BranchDag::new();
        let err = dag.add(node("child", Some("ghost"))).unwrap_err();
        assert_eq!(err.kind(), gastown_core::error::ErrorKind::DagMissingParent);
    }

    #[test]
    fn add_rejects_duplicate() {
        let mut dag = BranchDag::new();
        dag.add(node("a", None)).unwrap();
        assert!(dag.add(node("a", None)).is_err());
    }

    #[test]
    fn remove_fails_with_children() {
        let mut dag = BranchDag::new();
        dag.add(node("a", None)).unwrap();
        dag.add(node("b", Some("a"))).unwrap();
        let err = dag.remove("a").unwrap_err();
        assert_eq!(err.kind(), gastown_core::error::ErrorKind::DagHasDependents);
        dag.remove("b").unwrap();
        dag.remove("a").unwrap();
        assert!(dag.is_empty());
    }

    #[test]
    fn topological_order_is_parents_before_children() {
        let mut dag = BranchDag::new();
        dag.add(node("a", None)).unwrap();
        dag.add(node("b", Some("a"))).unwrap();
        dag.add(node("c", Some("b"))).unwrap();
        let order = dag.topological_order().unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn mark_updated_cascades_only_clean_descendants() {
        let mut dag = BranchDag::new();
        dag.add(node("a", None)).unwrap();
        dag.add(node("b", Some("a"))).unwrap();
        dag.add(node("c", Some("b"))).unwrap();
        dag.update("c", |n| n.status = NodeStatus::Conflict).unwrap();

        let flipped = dag.mark_updated("a", "sha1").unwrap();
        assert_eq!(flipped, vec!["b".to_string()]);
        assert_eq!(dag.get("c").unwrap().status, NodeStatus::Conflict);

        // Idempotent: calling again with b already needs-rebase flips nothing more.
        let flipped_again = dag.mark_updated("a", "sha2").unwrap();
        assert!(flipped_again.is_empty());
    }

    #[test]
    fn mark_root_updated_only_touches_direct_children() {
        let mut dag = BranchDag::new();
        dag.add(node("a", None)).unwrap();
        dag.add(node("b", Some("a"))).unwrap();
        let flipped = dag.mark_root_updated("new-root-sha");
        assert_eq!(flipped, vec!["a".to_string()]);
        assert_eq!(dag.get("b").unwrap().status, NodeStatus::Clean);
    }

    #[test]
    fn handle_merged_retargets_children_to_grandparent() {
        let mut dag = BranchDag::new();
        dag.add(node("a", None)).unwrap();
        dag.add(node("b", Some("a"))).unwrap();
        dag.add(node("c", Some("b"))).unwrap();
        let children = dag.handle_merged("b").unwrap();
        assert_eq!(children, vec!["c".to_string()]);
        assert_eq!(dag.get("b").unwrap().status, NodeStatus::Merged);
        assert_eq!(dag.get("c").unwrap().parent.as_deref(), Some("a"));
        assert_eq!(dag.get("c").unwrap().status, NodeStatus::NeedsRebase);
    }

    #[test]
    fn validate_passes_on_well_formed_dag() {
        let mut dag = BranchDag::new();
        dag.add(node("a", None)).unwrap();
        dag.add(node("b", Some("a"))).unwrap();
        dag.validate().unwrap();
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    #[derive(Debug, Clone)]
    enum Op {
        Add { name: usize, parent: Option<usize> },
        Retarget { name: usize, parent: Option<usize> },
    }

    fn op_strategy(pool: usize) -> impl Strategy<Value = Op> {
        let idx = 0..pool;
        prop_oneof![
            (idx.clone(), proptest::option::of(idx.clone())).prop_map(|(name, parent)| Op::Add { name, parent }),
            (idx.clone(), proptest::option::of(idx)).prop_map(|(name, parent)| Op::Retarget { name, parent }),
        ]
    }

    proptest! {
        // Invariant 1: randomized add/retarget sequences never corrupt the
        // parent<->children indices, regardless of how many ops are rejected
        // (duplicate names, missing parents, self-parenting).
        #[test]
        fn random_add_retarget_sequences_keep_the_dag_valid(ops in proptest::collection::vec(op_strategy(8), 0..40)) {
            let mut dag = BranchDag::new();
            for op in ops {
                match op {
                    Op::Add { name, parent } => {
                        let name = format!("n{name}");
                        let parent = parent.map(|p| format!("n{p}"));
                        let _ = dag.add(BranchNode::new(name, parent, "sha0"));
                    }
                    Op::Retarget { name, parent } => {
                        let name = format!("n{name}");
                        let parent = parent.map(|p| format!("n{p}"));
                        if parent.as_deref() == Some(name.as_str()) {
                            continue;
                        }
                        let _ = dag.retarget(&name, parent.as_deref());
                    }
                }
                // A retarget can legitimately introduce a cycle (retarget doesn't
                // walk descendants to forbid it); validate() must then report it
                // as DagCycle rather than leave the children/parent indices
                // inconsistent with each other.
                match dag.validate() {
                    Ok(()) => {}
                    Err(err) => prop_assert_eq!(err.kind(), gastown_core::error::ErrorKind::DagCycle),
                }
            }
        }
    }
}
