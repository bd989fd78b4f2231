//! Cross-table consistency check between buckets and the tree.
//!
//! After every committed split a consistent store satisfies:
//!
//! - every example has exactly one bucket, and that bucket is a reachable leaf
//! - each reachable leaf's `data_quantity` equals its bucket size
//! - the node table is a well-formed binary tree

use std::collections::BTreeSet;

use crate::repr::NodeId;

use super::{StoreError, StoreResult, TreeStore};

/// Outcome of [`check_consistency`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsistencyReport {
    pub example_count: usize,
    pub bucketed_count: usize,
    pub node_count: usize,
    pub leaf_count: usize,
    /// Sum of `data_quantity` over reachable leaves.
    pub leaf_quantity_total: usize,
    /// Nodes whose analysis lock is set.
    pub locked_nodes: Vec<NodeId>,
    /// Human-readable descriptions of every violation found.
    pub problems: Vec<String>,
}

impl ConsistencyReport {
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Inspect the store without modifying it.
pub fn check_consistency<S: TreeStore + ?Sized>(store: &S) -> StoreResult<ConsistencyReport> {
    let snapshot = store.snapshot()?;
    let counts = store.bucket_counts()?;
    let mut report = ConsistencyReport {
        example_count: store.example_count()?,
        bucketed_count: store.bucketed_count()?,
        node_count: snapshot.len(),
        ..Default::default()
    };

    if report.bucketed_count != report.example_count {
        report.problems.push(format!(
            "{} of {} examples have a bucket",
            report.bucketed_count, report.example_count
        ));
    }
    if snapshot.is_empty() {
        if report.example_count > 0 {
            report.problems.push("examples exist but the tree has no root".into());
        }
        return Ok(report);
    }
    if let Err(e) = snapshot.validate() {
        report.problems.push(e.to_string());
    }

    let leaves = snapshot.reachable_leaves();
    let leaf_ids: BTreeSet<NodeId> = leaves.iter().map(|n| n.id).collect();
    report.leaf_count = leaves.len();
    for leaf in &leaves {
        let bucket = counts.get(&leaf.id).copied().unwrap_or(0);
        match leaf.data_quantity() {
            Some(quantity) => {
                report.leaf_quantity_total += quantity;
                if quantity != bucket {
                    report.problems.push(format!(
                        "node {} records {quantity} examples but holds {bucket}",
                        leaf.id
                    ));
                }
            }
            None if bucket > 0 => {
                report.problems.push(format!(
                    "node {} holds {bucket} examples but has no estimate",
                    leaf.id
                ));
            }
            None => {}
        }
    }
    for (node, count) in &counts {
        if *count > 0 && !leaf_ids.contains(node) {
            report.problems.push(format!(
                "{count} examples sit in node {node}, which is not a reachable leaf"
            ));
        }
    }
    report.locked_nodes = snapshot
        .nodes()
        .filter(|n| n.being_analysed)
        .map(|n| n.id)
        .collect();
    Ok(report)
}

/// [`check_consistency`], failing with [`StoreError::ConsistencyViolation`]
/// if any problem is found.
pub fn ensure_consistent<S: TreeStore + ?Sized>(store: &S) -> StoreResult<ConsistencyReport> {
    let report = check_consistency(store)?;
    if report.is_consistent() {
        Ok(report)
    } else {
        Err(StoreError::violation(report.problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TrainingExample;
    use crate::repr::{LeafEstimate, PathValue, ROOT_NODE_ID};
    use crate::store::{MemoryStore, NodeStore, RowStore};

    fn estimate(n: usize) -> LeafEstimate {
        LeafEstimate {
            exemplar: PathValue::new(vec![1]).unwrap(),
            data_quantity: n,
            loss: 0.0,
        }
    }

    fn examples() -> Vec<TrainingExample> {
        (1..=3)
            .map(|id| TrainingExample::parse(id, "1", &["1"]).unwrap())
            .collect()
    }

    #[test]
    fn fresh_store_without_root_is_inconsistent() {
        let store = MemoryStore::from_examples(examples()).unwrap();
        let report = check_consistency(&store).unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.example_count, 3);
        assert_eq!(report.bucketed_count, 0);
    }

    #[test]
    fn bootstrapped_root_is_consistent() {
        let store = MemoryStore::from_examples(examples()).unwrap();
        store.init_root().unwrap();
        // Bucketed but not yet estimated.
        assert!(ensure_consistent(&store).is_err());
        store.set_estimate(ROOT_NODE_ID, estimate(3)).unwrap();
        let report = ensure_consistent(&store).unwrap();
        assert_eq!(report.leaf_count, 1);
        assert_eq!(report.leaf_quantity_total, 3);
        assert!(report.locked_nodes.is_empty());
    }

    #[test]
    fn stale_quantity_and_stray_rows_are_reported() {
        let store = MemoryStore::from_examples(examples()).unwrap();
        store.init_root().unwrap();
        store.set_estimate(ROOT_NODE_ID, estimate(2)).unwrap();
        let report = check_consistency(&store).unwrap();
        assert_eq!(report.problems.len(), 1);
        assert!(report.problems[0].contains("records 2 examples but holds 3"));

        store.set_estimate(ROOT_NODE_ID, estimate(3)).unwrap();
        let stray = store.create_node(Some(ROOT_NODE_ID), estimate(1)).unwrap();
        store.reassign_examples(&[1], stray).unwrap();
        let err = ensure_consistent(&store).unwrap_err();
        assert!(matches!(err, StoreError::ConsistencyViolation { .. }));
    }

    #[test]
    fn locks_are_listed() {
        let store = MemoryStore::from_examples(examples()).unwrap();
        store.init_root().unwrap();
        store.set_estimate(ROOT_NODE_ID, estimate(3)).unwrap();
        store.set_being_analysed(ROOT_NODE_ID, true).unwrap();
        let report = ensure_consistent(&store).unwrap();
        assert_eq!(report.locked_nodes, vec![ROOT_NODE_ID]);
    }
}
