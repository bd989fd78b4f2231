//! Point-in-time views of a tree.
//!
//! A [`TreeSnapshot`] is a node-id indexed copy of a tree, built either from
//! the live node set or from the node set *as of* a past timestamp. Only the
//! `created_at` and `populated_at` stamps on each node are needed to rebuild
//! the past shape; no per-node storage queries are made.
//!
//! - [`project_as_of`]: the pure temporal projection
//! - [`TreeSnapshot::validate`]: structural checks
//! - [`TreeSnapshot::render`] / [`TreeSnapshot::describe_ancestry`]: diagnostics

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::data::{describe_path, Decoder};

use super::node::{Node, NodeId, ROOT_NODE_ID};

// ============================================================================
// Temporal projection
// ============================================================================

/// Reconstruct the node set as it looked at `cutoff`.
///
/// - created after `cutoff`: dropped
/// - created at or before `cutoff`, children committed after it: kept as a leaf
/// - otherwise: kept unchanged
pub fn project_as_of<'a, I>(nodes: I, cutoff: DateTime<Utc>) -> Vec<Node>
where
    I: IntoIterator<Item = &'a Node>,
{
    nodes
        .into_iter()
        .filter(|n| n.created_at <= cutoff)
        .map(|n| match n.children_populated_at() {
            Some(populated) if populated > cutoff => n.stripped_to_leaf(),
            _ => n.clone(),
        })
        .collect()
}

// ============================================================================
// SnapshotValidationError
// ============================================================================

/// Structural problems found by [`TreeSnapshot::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotValidationError {
    /// Nodes exist but none has the root id.
    #[error("snapshot has {n_nodes} nodes but no root")]
    MissingRoot { n_nodes: usize },
    /// A split references a node that is not in the snapshot.
    #[error("node {node} references missing child {child}")]
    DanglingChild { node: NodeId, child: NodeId },
    /// A node is the child of more than one split, or of itself.
    #[error("node {child} is reached more than once")]
    DuplicateVisit { child: NodeId },
    /// A node is in the snapshot but not reachable from the root.
    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },
    /// A node's stored parent disagrees with the split that points at it.
    #[error("node {node} records parent {recorded:?} but is a child of {actual:?}")]
    ParentMismatch {
        node: NodeId,
        recorded: Option<NodeId>,
        actual: Option<NodeId>,
    },
}

// ============================================================================
// TreeSnapshot
// ============================================================================

/// Immutable, node-id indexed view of a tree.
#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    nodes: BTreeMap<NodeId, Node>,
    /// child id -> parent id, derived from split rules.
    parents: HashMap<NodeId, NodeId>,
}

impl TreeSnapshot {
    /// Index a node set as-is.
    pub fn from_nodes<I: IntoIterator<Item = Node>>(nodes: I) -> Self {
        let nodes: BTreeMap<NodeId, Node> = nodes.into_iter().map(|n| (n.id, n)).collect();
        let mut parents = HashMap::with_capacity(nodes.len());
        for node in nodes.values() {
            if let Some((inner, outer)) = node.children() {
                parents.insert(inner, node.id);
                parents.insert(outer, node.id);
            }
        }
        Self { nodes, parents }
    }

    /// Index the node set as it looked at `cutoff`.
    pub fn as_of(nodes: &[Node], cutoff: DateTime<Utc>) -> Self {
        Self::from_nodes(project_as_of(nodes, cutoff))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    #[inline]
    pub fn root(&self) -> Option<&Node> {
        self.nodes.get(&ROOT_NODE_ID)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Parent of `id` according to the split rules in this snapshot.
    #[inline]
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Ancestors of `id`, root first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Vec<&Node> {
        let mut chain = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            match self.nodes.get(&parent) {
                Some(node) => chain.push(node),
                None => break,
            }
            // A well-formed tree has fewer ancestors than nodes.
            if chain.len() > self.nodes.len() {
                break;
            }
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Number of edges from the root to `id`.
    pub fn depth_of(&self, id: NodeId) -> usize {
        self.ancestors(id).len()
    }

    /// Leaves reachable from the root, in traversal order (inner before outer).
    pub fn reachable_leaves(&self) -> Vec<&Node> {
        let mut leaves = Vec::new();
        let mut stack: Vec<NodeId> = self.root().map(|r| r.id).into_iter().collect();
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            match node.children() {
                Some((inner, outer)) => {
                    stack.push(outer);
                    stack.push(inner);
                }
                None => leaves.push(node),
            }
        }
        leaves
    }

    /// Time of the most recent creation or split in the snapshot.
    pub fn latest_mutation(&self) -> Option<DateTime<Utc>> {
        self.significant_timestamps().last().copied()
    }

    /// Every distinct creation and children-populated time, ascending.
    ///
    /// Projecting at each of these yields every distinct historical shape.
    pub fn significant_timestamps(&self) -> Vec<DateTime<Utc>> {
        let mut stamps = BTreeSet::new();
        for node in self.nodes.values() {
            stamps.insert(node.created_at);
            if let Some(t) = node.children_populated_at() {
                stamps.insert(t);
            }
        }
        stamps.into_iter().collect()
    }

    /// Check that the snapshot is a binary tree rooted at the root id.
    ///
    /// An empty snapshot is valid (a view from before the root existed).
    pub fn validate(&self) -> Result<(), SnapshotValidationError> {
        if self.nodes.is_empty() {
            return Ok(());
        }
        if self.root().is_none() {
            return Err(SnapshotValidationError::MissingRoot {
                n_nodes: self.nodes.len(),
            });
        }

        let mut visited = BTreeSet::new();
        let mut stack = vec![ROOT_NODE_ID];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                return Err(SnapshotValidationError::DuplicateVisit { child: id });
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if let Some((inner, outer)) = node.children() {
                for child in [inner, outer] {
                    if !self.nodes.contains_key(&child) {
                        return Err(SnapshotValidationError::DanglingChild { node: id, child });
                    }
                    stack.push(child);
                }
            }
        }

        if let Some(node) = self.nodes.keys().find(|id| !visited.contains(id)) {
            return Err(SnapshotValidationError::UnreachableNode { node: *node });
        }

        for node in self.nodes.values() {
            let actual = self.parent_of(node.id);
            if node.parent != actual {
                return Err(SnapshotValidationError::ParentMismatch {
                    node: node.id,
                    recorded: node.parent,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Human-readable description of the decisions leading to `id`.
    pub fn describe_ancestry(&self, id: NodeId, decoder: &dyn Decoder) -> String {
        let mut out = String::new();
        let mut child = id;
        let ancestors = self.ancestors(id);
        let mut steps = Vec::with_capacity(ancestors.len());
        for ancestor in ancestors.iter().rev() {
            if let Some(split) = &ancestor.split {
                let side = if split.inner == child { "inside" } else { "outside" };
                steps.push(format!(
                    "[Node {}] if context{} is {} {}",
                    ancestor.id,
                    split.context_k,
                    side,
                    describe_path(decoder, &split.region)
                ));
            }
            child = ancestor.id;
        }
        steps.reverse();
        for step in steps {
            let _ = write!(out, "{step} AND ");
        }
        match self.get(id).and_then(Node::exemplar) {
            Some(exemplar) => {
                let _ = write!(out, "[Node {id} says 'predict {}']", describe_path(decoder, exemplar));
            }
            None => {
                let _ = write!(out, "[Node {id}]");
            }
        }
        out
    }

    /// Indented text rendering of the whole tree.
    pub fn render(&self, decoder: &dyn Decoder) -> String {
        let mut out = String::new();
        if self.root().is_some() {
            self.render_node(&mut out, ROOT_NODE_ID, 0, decoder, &mut BTreeSet::new());
        }
        out
    }

    fn render_node(
        &self,
        out: &mut String,
        id: NodeId,
        depth: usize,
        decoder: &dyn Decoder,
        seen: &mut BTreeSet<NodeId>,
    ) {
        let indent = "  ".repeat(depth);
        let Some(node) = self.nodes.get(&id) else {
            let _ = writeln!(out, "{indent}- Node {id}: not found");
            return;
        };
        if !seen.insert(id) {
            return;
        }
        match &node.estimate {
            Some(e) => {
                let _ = writeln!(
                    out,
                    "{indent}- Node {id}: suggest {}, loss {:.6}, {} examples",
                    describe_path(decoder, &e.exemplar),
                    e.loss,
                    e.data_quantity
                );
            }
            None => {
                let _ = writeln!(out, "{indent}- Node {id}: no estimate yet");
            }
        }
        if let Some(split) = &node.split {
            let region = describe_path(decoder, &split.region);
            let _ = writeln!(out, "{indent}  / when context{} is inside {region}", split.context_k);
            self.render_node(out, split.inner, depth + 1, decoder, seen);
            let _ = writeln!(out, "{indent}  \\ when context{} is outside {region}", split.context_k);
            self.render_node(out, split.outer, depth + 1, decoder, seen);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
