//! Tree node types.

use chrono::{DateTime, Utc};

use super::path::PathValue;

/// Stable node identifier. Ids start at [`ROOT_NODE_ID`] and are never reused.
pub type NodeId = u64;

/// Id of the root node of every tree.
pub const ROOT_NODE_ID: NodeId = 1;

/// What a node predicts when treated as a leaf, with the statistics of the
/// estimation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafEstimate {
    /// Representative path predicted by this node.
    pub exemplar: PathValue,
    /// Number of examples the estimate was computed over.
    pub data_quantity: usize,
    /// Estimated aggregate cost of predicting `exemplar` for those examples.
    pub loss: f64,
}

/// The split rule of an internal node.
///
/// All fields are set together, once, when the node acquires its children.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitRule {
    /// 1-based position in the context window tested by this node.
    pub context_k: usize,
    /// A context value whose path starts with this region goes to `inner`.
    pub region: PathValue,
    /// Child receiving values inside the region.
    pub inner: NodeId,
    /// Child receiving everything else.
    pub outer: NodeId,
    /// When the children were committed.
    pub populated_at: DateTime<Utc>,
}

impl SplitRule {
    /// The child a context value descends to, and whether it was inside.
    #[inline]
    pub fn route(&self, value: &PathValue) -> (NodeId, bool) {
        if self.region.contains(value) {
            (self.inner, true)
        } else {
            (self.outer, false)
        }
    }
}

/// One node of an ultrametric tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Stable id (1 = root).
    pub id: NodeId,
    /// Parent id, `None` only for the root.
    pub parent: Option<NodeId>,
    /// Leaf prediction. `None` only for a root that has not been bootstrapped.
    pub estimate: Option<LeafEstimate>,
    /// Split rule, present iff the node has children.
    pub split: Option<SplitRule>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Advisory lock: the node is reserved by an in-progress split.
    pub being_analysed: bool,
}

impl Node {
    /// A fresh leaf.
    pub fn leaf(
        id: NodeId,
        parent: Option<NodeId>,
        estimate: Option<LeafEstimate>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            parent,
            estimate,
            split: None,
            created_at,
            being_analysed: false,
        }
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.split.is_some()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.id == ROOT_NODE_ID
    }

    pub fn exemplar(&self) -> Option<&PathValue> {
        self.estimate.as_ref().map(|e| &e.exemplar)
    }

    pub fn data_quantity(&self) -> Option<usize> {
        self.estimate.as_ref().map(|e| e.data_quantity)
    }

    pub fn loss(&self) -> Option<f64> {
        self.estimate.as_ref().map(|e| e.loss)
    }

    pub fn context_k(&self) -> Option<usize> {
        self.split.as_ref().map(|s| s.context_k)
    }

    pub fn inner_region_prefix(&self) -> Option<&PathValue> {
        self.split.as_ref().map(|s| &s.region)
    }

    pub fn inner_child(&self) -> Option<NodeId> {
        self.split.as_ref().map(|s| s.inner)
    }

    pub fn outer_child(&self) -> Option<NodeId> {
        self.split.as_ref().map(|s| s.outer)
    }

    pub fn children_populated_at(&self) -> Option<DateTime<Utc>> {
        self.split.as_ref().map(|s| s.populated_at)
    }

    /// Child ids as `(inner, outer)`.
    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        self.split.as_ref().map(|s| (s.inner, s.outer))
    }

    /// A copy of this node with its split fields cleared.
    pub fn stripped_to_leaf(&self) -> Self {
        Self {
            split: None,
            ..self.clone()
        }
    }
}
