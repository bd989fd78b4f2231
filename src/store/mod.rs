//! Persistent state of a training run.
//!
//! Two logical tables make up the state:
//!
//! - the **node table** ([`NodeStore`]): every node ever created, with its
//!   estimate, split rule and timestamps
//! - the **row table** ([`RowStore`]): the training examples and, for each,
//!   the leaf it currently sits in (its *bucket*)
//!
//! [`TreeStore`] combines both and adds the multi-table operations that must
//! be applied atomically: bootstrapping the root, committing a split, and
//! pruning a subtree.
//!
//! All methods take `&self`; implementations synchronise internally so a
//! store can be shared between a trainer and concurrent readers.

mod clock;
mod consistency;
mod error;
mod memory;

use std::collections::{BTreeMap, BTreeSet};

pub use clock::{Clock, ManualClock, SystemClock};
pub use consistency::{check_consistency, ensure_consistent, ConsistencyReport};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::data::{ExampleId, TrainingExample};
use crate::repr::{LeafEstimate, Node, NodeId, PathValue, TreeSnapshot};

// ============================================================================
// SplitCommit
// ============================================================================

/// One child of a split about to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildCommit {
    /// Estimate computed over exactly `example_ids`.
    pub estimate: LeafEstimate,
    /// Examples moving into this child.
    pub example_ids: Vec<ExampleId>,
}

/// Everything needed to turn a leaf into an internal node.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitCommit {
    /// 1-based context position tested.
    pub context_k: usize,
    /// Region prefix; context values inside it go to `inner`.
    pub region: PathValue,
    pub inner: ChildCommit,
    pub outer: ChildCommit,
}

// ============================================================================
// Store traits
// ============================================================================

/// Access to training examples and their bucket assignment.
pub trait RowStore: Send + Sync {
    /// Number of stored examples.
    fn example_count(&self) -> StoreResult<usize>;

    /// Number of examples that have a bucket.
    fn bucketed_count(&self) -> StoreResult<usize>;

    /// Examples whose bucket is `node`, in id order.
    fn load_examples_in_node(&self, node: NodeId) -> StoreResult<Vec<TrainingExample>>;

    /// `(id, context value at position k)` for every example in `node`, in id order.
    ///
    /// Fails with [`StoreError::ContextIndexOutOfRange`] if any example in the
    /// bucket has no position `k`.
    fn load_context_column_in_node(
        &self,
        node: NodeId,
        k: usize,
    ) -> StoreResult<Vec<(ExampleId, PathValue)>>;

    /// Move examples into bucket `node`.
    fn reassign_examples(&self, ids: &[ExampleId], node: NodeId) -> StoreResult<()>;

    /// Bucket sizes keyed by node.
    fn bucket_counts(&self) -> StoreResult<BTreeMap<NodeId, usize>>;

    /// The bucket of one example.
    fn bucket_of(&self, id: ExampleId) -> StoreResult<Option<NodeId>>;
}

/// Access to the node table.
pub trait NodeStore: Send + Sync {
    /// One node by id.
    fn fetch_node(&self, id: NodeId) -> StoreResult<Option<Node>>;

    /// All nodes, in id order.
    fn fetch_all_nodes(&self) -> StoreResult<Vec<Node>>;

    /// Number of nodes.
    fn node_count(&self) -> StoreResult<usize>;

    /// Create a detached leaf and return its fresh id.
    fn create_node(&self, parent: Option<NodeId>, estimate: LeafEstimate) -> StoreResult<NodeId>;

    /// Record the split rule of a leaf whose children already exist.
    ///
    /// Sets the children-populated time to the store's current time.
    fn update_node_split(
        &self,
        node: NodeId,
        context_k: usize,
        region: &PathValue,
        inner: NodeId,
        outer: NodeId,
    ) -> StoreResult<()>;

    /// Replace a node's leaf estimate.
    fn set_estimate(&self, node: NodeId, estimate: LeafEstimate) -> StoreResult<()>;

    /// Set or clear the advisory analysis lock unconditionally.
    fn set_being_analysed(&self, node: NodeId, flag: bool) -> StoreResult<()>;

    /// Take the analysis lock of a leaf if nobody holds it.
    ///
    /// Returns `false` if the node is already locked or has children.
    fn try_reserve(&self, node: NodeId) -> StoreResult<bool>;

    /// The leaf with the largest loss among unlocked leaves holding at least
    /// `min_count` examples, skipping `exclude`. Ties go to the lowest id.
    /// Fails with [`StoreError::NotInitialized`] on an empty node table.
    fn most_urgent_leaf(
        &self,
        min_count: usize,
        exclude: &BTreeSet<NodeId>,
    ) -> StoreResult<Option<(NodeId, f64)>>;
}

/// Node and row tables together, with their multi-table operations.
pub trait TreeStore: RowStore + NodeStore {
    /// Current time according to the store's clock.
    fn now(&self) -> DateTime<Utc>;

    /// Create the root if missing (with no estimate) and put every
    /// unbucketed example in it.
    ///
    /// Fails if unbucketed examples exist but the root already has children.
    fn init_root(&self) -> StoreResult<()>;

    /// Atomically create both children of `parent`, record the split and
    /// move the examples.
    ///
    /// Validates before mutating: `parent` must be a leaf, the two id lists
    /// must partition its bucket exactly, and each child's `data_quantity`
    /// must equal its id count. On error nothing changes.
    fn commit_split(&self, parent: NodeId, split: &SplitCommit) -> StoreResult<(NodeId, NodeId)>;

    /// Delete all descendants of `node`, move their examples back into it and
    /// clear its split. Returns the number of nodes deleted.
    fn prune(&self, node: NodeId) -> StoreResult<usize>;

    /// Snapshot of the current tree.
    fn snapshot(&self) -> StoreResult<TreeSnapshot> {
        Ok(TreeSnapshot::from_nodes(self.fetch_all_nodes()?))
    }

    /// Snapshot of the tree as it looked at `cutoff`.
    fn snapshot_as_of(&self, cutoff: DateTime<Utc>) -> StoreResult<TreeSnapshot> {
        Ok(TreeSnapshot::as_of(&self.fetch_all_nodes()?, cutoff))
    }

    /// Every distinct creation and split time, ascending.
    fn significant_timestamps(&self) -> StoreResult<Vec<DateTime<Utc>>> {
        Ok(self.snapshot()?.significant_timestamps())
    }
}
