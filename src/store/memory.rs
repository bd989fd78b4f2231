//! In-memory [`TreeStore`] guarded by a single reader-writer lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::data::{ExampleId, TrainingExample};
use crate::repr::{LeafEstimate, Node, NodeId, PathValue, SplitRule, ROOT_NODE_ID};

use super::{
    Clock, NodeStore, RowStore, SplitCommit, StoreError, StoreResult, SystemClock, TreeStore,
};

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug)]
struct Tables {
    examples: BTreeMap<ExampleId, TrainingExample>,
    /// example -> leaf
    buckets: BTreeMap<ExampleId, NodeId>,
    /// leaf -> examples; inverse of `buckets`
    members: HashMap<NodeId, BTreeSet<ExampleId>>,
    nodes: BTreeMap<NodeId, Node>,
    next_id: NodeId,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            examples: BTreeMap::new(),
            buckets: BTreeMap::new(),
            members: HashMap::new(),
            nodes: BTreeMap::new(),
            next_id: ROOT_NODE_ID,
        }
    }
}

impl Tables {
    fn alloc_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn assign(&mut self, example: ExampleId, node: NodeId) {
        if let Some(old) = self.buckets.insert(example, node) {
            if let Some(set) = self.members.get_mut(&old) {
                set.remove(&example);
                if set.is_empty() {
                    self.members.remove(&old);
                }
            }
        }
        self.members.entry(node).or_default().insert(example);
    }

    fn node(&self, id: NodeId) -> StoreResult<&Node> {
        self.nodes.get(&id).ok_or(StoreError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> StoreResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(StoreError::NodeNotFound(id))
    }

    fn member_ids(&self, node: NodeId) -> impl Iterator<Item = ExampleId> + '_ {
        self.members.get(&node).into_iter().flatten().copied()
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// Thread-safe in-memory store.
///
/// Every operation takes the lock once, so multi-table operations such as
/// [`TreeStore::commit_split`] are atomic with respect to readers.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// An empty store on the given clock.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock: Arc::new(clock),
        }
    }

    /// A store holding `examples`, on the system clock.
    pub fn from_examples<I>(examples: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = TrainingExample>,
    {
        let store = Self::new();
        store.insert_examples(examples)?;
        Ok(store)
    }

    /// Add one example. It has no bucket until [`TreeStore::init_root`].
    pub fn insert_example(&self, example: TrainingExample) -> StoreResult<()> {
        let mut t = self.tables.write();
        if t.examples.contains_key(&example.id) {
            return Err(StoreError::DuplicateExample(example.id));
        }
        t.examples.insert(example.id, example);
        Ok(())
    }

    /// Add many examples; stops at the first duplicate.
    pub fn insert_examples<I>(&self, examples: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = TrainingExample>,
    {
        for example in examples {
            self.insert_example(example)?;
        }
        Ok(())
    }

    /// Rebuild a store from previously exported tables.
    ///
    /// Buckets must reference known examples and nodes.
    pub fn from_parts(
        examples: Vec<TrainingExample>,
        buckets: Vec<(ExampleId, NodeId)>,
        nodes: Vec<Node>,
        clock: impl Clock + 'static,
    ) -> StoreResult<Self> {
        let mut t = Tables::default();
        for example in examples {
            if t.examples.contains_key(&example.id) {
                return Err(StoreError::DuplicateExample(example.id));
            }
            t.examples.insert(example.id, example);
        }
        for node in nodes {
            t.next_id = t.next_id.max(node.id + 1);
            t.nodes.insert(node.id, node);
        }
        for (example, node) in buckets {
            if !t.examples.contains_key(&example) {
                return Err(StoreError::ExampleNotFound(example));
            }
            t.node(node)?;
            t.assign(example, node);
        }
        Ok(Self {
            tables: RwLock::new(t),
            clock: Arc::new(clock),
        })
    }

    /// Copy of all tables: examples, buckets and nodes, each in id order.
    pub fn export(&self) -> (Vec<TrainingExample>, Vec<(ExampleId, NodeId)>, Vec<Node>) {
        let t = self.tables.read();
        (
            t.examples.values().cloned().collect(),
            t.buckets.iter().map(|(e, n)| (*e, *n)).collect(),
            t.nodes.values().cloned().collect(),
        )
    }

    /// All stored examples in id order.
    pub fn examples(&self) -> Vec<TrainingExample> {
        self.tables.read().examples.values().cloned().collect()
    }
}

// ============================================================================
// RowStore
// ============================================================================

impl RowStore for MemoryStore {
    fn example_count(&self) -> StoreResult<usize> {
        Ok(self.tables.read().examples.len())
    }

    fn bucketed_count(&self) -> StoreResult<usize> {
        Ok(self.tables.read().buckets.len())
    }

    fn load_examples_in_node(&self, node: NodeId) -> StoreResult<Vec<TrainingExample>> {
        let t = self.tables.read();
        t.node(node)?;
        t.member_ids(node)
            .map(|id| {
                t.examples
                    .get(&id)
                    .cloned()
                    .ok_or(StoreError::ExampleNotFound(id))
            })
            .collect()
    }

    fn load_context_column_in_node(
        &self,
        node: NodeId,
        k: usize,
    ) -> StoreResult<Vec<(ExampleId, PathValue)>> {
        let t = self.tables.read();
        t.node(node)?;
        t.member_ids(node)
            .map(|id| {
                let example = t.examples.get(&id).ok_or(StoreError::ExampleNotFound(id))?;
                let value = example
                    .context_at(k)
                    .ok_or(StoreError::ContextIndexOutOfRange {
                        k,
                        example: id,
                        width: example.context_len(),
                    })?;
                Ok((id, value.clone()))
            })
            .collect()
    }

    fn reassign_examples(&self, ids: &[ExampleId], node: NodeId) -> StoreResult<()> {
        let mut t = self.tables.write();
        t.node(node)?;
        if let Some(missing) = ids.iter().find(|id| !t.examples.contains_key(id)) {
            return Err(StoreError::ExampleNotFound(*missing));
        }
        for id in ids {
            t.assign(*id, node);
        }
        Ok(())
    }

    fn bucket_counts(&self) -> StoreResult<BTreeMap<NodeId, usize>> {
        let t = self.tables.read();
        Ok(t.members.iter().map(|(node, set)| (*node, set.len())).collect())
    }

    fn bucket_of(&self, id: ExampleId) -> StoreResult<Option<NodeId>> {
        let t = self.tables.read();
        if !t.examples.contains_key(&id) {
            return Err(StoreError::ExampleNotFound(id));
        }
        Ok(t.buckets.get(&id).copied())
    }
}

// ============================================================================
// NodeStore
// ============================================================================

impl NodeStore for MemoryStore {
    fn fetch_node(&self, id: NodeId) -> StoreResult<Option<Node>> {
        Ok(self.tables.read().nodes.get(&id).cloned())
    }

    fn fetch_all_nodes(&self) -> StoreResult<Vec<Node>> {
        Ok(self.tables.read().nodes.values().cloned().collect())
    }

    fn node_count(&self) -> StoreResult<usize> {
        Ok(self.tables.read().nodes.len())
    }

    fn create_node(&self, parent: Option<NodeId>, estimate: LeafEstimate) -> StoreResult<NodeId> {
        let now = self.clock.now();
        let mut t = self.tables.write();
        if let Some(parent) = parent {
            t.node(parent)?;
        }
        let id = t.alloc_id();
        t.nodes.insert(id, Node::leaf(id, parent, Some(estimate), now));
        Ok(id)
    }

    fn update_node_split(
        &self,
        node: NodeId,
        context_k: usize,
        region: &PathValue,
        inner: NodeId,
        outer: NodeId,
    ) -> StoreResult<()> {
        let now = self.clock.now();
        let mut t = self.tables.write();
        if t.node(node)?.has_children() {
            return Err(StoreError::NodeAlreadySplit(node));
        }
        if context_k == 0 {
            return Err(StoreError::violation("context positions start at 1"));
        }
        if inner == outer {
            return Err(StoreError::violation(format!(
                "node {node} cannot use {inner} as both children"
            )));
        }
        for child in [inner, outer] {
            let recorded = t.node(child)?.parent;
            if recorded != Some(node) {
                return Err(StoreError::violation(format!(
                    "node {child} has parent {recorded:?}, expected {node}"
                )));
            }
        }
        t.node_mut(node)?.split = Some(SplitRule {
            context_k,
            region: region.clone(),
            inner,
            outer,
            populated_at: now,
        });
        Ok(())
    }

    fn set_estimate(&self, node: NodeId, estimate: LeafEstimate) -> StoreResult<()> {
        self.tables.write().node_mut(node)?.estimate = Some(estimate);
        Ok(())
    }

    fn set_being_analysed(&self, node: NodeId, flag: bool) -> StoreResult<()> {
        self.tables.write().node_mut(node)?.being_analysed = flag;
        Ok(())
    }

    fn try_reserve(&self, node: NodeId) -> StoreResult<bool> {
        let mut t = self.tables.write();
        let n = t.node_mut(node)?;
        if n.being_analysed || n.has_children() {
            return Ok(false);
        }
        n.being_analysed = true;
        Ok(true)
    }

    fn most_urgent_leaf(
        &self,
        min_count: usize,
        exclude: &BTreeSet<NodeId>,
    ) -> StoreResult<Option<(NodeId, f64)>> {
        let t = self.tables.read();
        if t.nodes.is_empty() {
            return Err(StoreError::NotInitialized);
        }
        let best = t
            .nodes
            .values()
            .filter(|n| n.is_leaf() && !n.being_analysed && !exclude.contains(&n.id))
            .filter_map(|n| n.estimate.as_ref().map(|e| (n.id, e)))
            .filter(|(_, e)| e.data_quantity >= min_count)
            .fold(None::<(NodeId, f64)>, |best, (id, e)| match best {
                Some((_, loss)) if e.loss > loss => Some((id, e.loss)),
                Some(_) => best,
                None => Some((id, e.loss)),
            });
        Ok(best)
    }
}

// ============================================================================
// TreeStore
// ============================================================================

impl TreeStore for MemoryStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn init_root(&self) -> StoreResult<()> {
        let now = self.clock.now();
        let mut guard = self.tables.write();
        let t = &mut *guard;
        if !t.nodes.contains_key(&ROOT_NODE_ID) {
            t.nodes
                .insert(ROOT_NODE_ID, Node::leaf(ROOT_NODE_ID, None, None, now));
            t.next_id = t.next_id.max(ROOT_NODE_ID + 1);
        }
        let unbucketed: Vec<ExampleId> = t
            .examples
            .keys()
            .filter(|id| !t.buckets.contains_key(id))
            .copied()
            .collect();
        if unbucketed.is_empty() {
            return Ok(());
        }
        if t.node(ROOT_NODE_ID)?.has_children() {
            return Err(StoreError::violation(format!(
                "{} examples have no bucket but the root is already split",
                unbucketed.len()
            )));
        }
        for id in unbucketed {
            t.assign(id, ROOT_NODE_ID);
        }
        Ok(())
    }

    fn commit_split(&self, parent: NodeId, split: &SplitCommit) -> StoreResult<(NodeId, NodeId)> {
        let now = self.clock.now();
        let mut guard = self.tables.write();
        let t = &mut *guard;

        if t.node(parent)?.has_children() {
            return Err(StoreError::NodeAlreadySplit(parent));
        }
        if split.context_k == 0 {
            return Err(StoreError::violation("context positions start at 1"));
        }
        for (side, child) in [("inner", &split.inner), ("outer", &split.outer)] {
            if child.example_ids.is_empty() {
                return Err(StoreError::violation(format!(
                    "{side} child of node {parent} would be empty"
                )));
            }
            if child.estimate.data_quantity != child.example_ids.len() {
                return Err(StoreError::violation(format!(
                    "{side} child of node {parent} claims {} examples but lists {}",
                    child.estimate.data_quantity,
                    child.example_ids.len()
                )));
            }
        }
        let bucket = t.members.get(&parent);
        let bucket_len = bucket.map_or(0, BTreeSet::len);
        let mut seen = BTreeSet::new();
        for id in split.inner.example_ids.iter().chain(&split.outer.example_ids) {
            if !bucket.is_some_and(|b| b.contains(id)) {
                return Err(StoreError::violation(format!(
                    "example {id} is not in node {parent}"
                )));
            }
            if !seen.insert(*id) {
                return Err(StoreError::violation(format!(
                    "example {id} is listed twice in split of node {parent}"
                )));
            }
        }
        if seen.len() != bucket_len {
            return Err(StoreError::violation(format!(
                "split of node {parent} covers {} of its {bucket_len} examples",
                seen.len()
            )));
        }

        let inner_id = t.alloc_id();
        let outer_id = t.alloc_id();
        t.nodes.insert(
            inner_id,
            Node::leaf(inner_id, Some(parent), Some(split.inner.estimate.clone()), now),
        );
        t.nodes.insert(
            outer_id,
            Node::leaf(outer_id, Some(parent), Some(split.outer.estimate.clone()), now),
        );
        t.node_mut(parent)?.split = Some(SplitRule {
            context_k: split.context_k,
            region: split.region.clone(),
            inner: inner_id,
            outer: outer_id,
            populated_at: now,
        });
        for id in &split.inner.example_ids {
            t.assign(*id, inner_id);
        }
        for id in &split.outer.example_ids {
            t.assign(*id, outer_id);
        }
        Ok((inner_id, outer_id))
    }

    fn prune(&self, node: NodeId) -> StoreResult<usize> {
        let mut guard = self.tables.write();
        let t = &mut *guard;
        let Some((inner, outer)) = t.node(node)?.children() else {
            return Ok(0);
        };

        let mut stack = vec![inner, outer];
        let mut removed = Vec::new();
        while let Some(id) = stack.pop() {
            if let Some(child) = t.nodes.remove(&id) {
                if let Some((a, b)) = child.children() {
                    stack.push(a);
                    stack.push(b);
                }
                removed.push(id);
            }
        }
        for id in &removed {
            if let Some(members) = t.members.remove(id) {
                for example in members {
                    t.assign(example, node);
                }
            }
        }
        let held = t.members.get(&node).map_or(0, BTreeSet::len);
        let restored = t.node_mut(node)?;
        restored.split = None;
        if let Some(estimate) = restored.estimate.as_mut() {
            estimate.data_quantity = held;
        }
        Ok(removed.len())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChildCommit, ManualClock};
    use chrono::{Duration, TimeZone};

    fn p(s: &str) -> PathValue {
        s.parse().unwrap()
    }

    fn estimate(exemplar: &str, n: usize, loss: f64) -> LeafEstimate {
        LeafEstimate {
            exemplar: p(exemplar),
            data_quantity: n,
            loss,
        }
    }

    fn store() -> MemoryStore {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let store = MemoryStore::with_clock(ManualClock::ticking(start, Duration::seconds(1)));
        store
            .insert_examples([
                TrainingExample::parse(1, "1.2", &["1.1", "2"]).unwrap(),
                TrainingExample::parse(2, "1.2", &["1.1", "3"]).unwrap(),
                TrainingExample::parse(3, "1.3", &["1.2", "2"]).unwrap(),
                TrainingExample::parse(4, "2.1", &["3.1", "2"]).unwrap(),
            ])
            .unwrap();
        store.init_root().unwrap();
        store.set_estimate(ROOT_NODE_ID, estimate("1.2", 4, 2.0)).unwrap();
        store
    }

    fn commit(inner: &[ExampleId], outer: &[ExampleId]) -> SplitCommit {
        SplitCommit {
            context_k: 1,
            region: p("1"),
            inner: ChildCommit {
                estimate: estimate("1.2", inner.len(), 0.5),
                example_ids: inner.to_vec(),
            },
            outer: ChildCommit {
                estimate: estimate("2.1", outer.len(), 0.0),
                example_ids: outer.to_vec(),
            },
        }
    }

    #[test]
    fn init_root_buckets_everything() {
        let store = store();
        assert_eq!(store.bucketed_count().unwrap(), 4);
        assert_eq!(store.load_examples_in_node(ROOT_NODE_ID).unwrap().len(), 4);
        assert_eq!(store.node_count().unwrap(), 1);
        // Idempotent.
        store.init_root().unwrap();
        assert_eq!(store.node_count().unwrap(), 1);
    }

    #[test]
    fn duplicate_example_rejected() {
        let store = store();
        let err = store
            .insert_example(TrainingExample::parse(2, "1", &["1"]).unwrap())
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateExample(2));
    }

    #[test]
    fn context_column_is_one_based_and_checked() {
        let store = store();
        let column = store.load_context_column_in_node(ROOT_NODE_ID, 2).unwrap();
        let values: Vec<String> = column.iter().map(|(_, v)| v.to_string()).collect();
        assert_eq!(values, vec!["2", "3", "2", "2"]);
        assert!(matches!(
            store.load_context_column_in_node(ROOT_NODE_ID, 3),
            Err(StoreError::ContextIndexOutOfRange { k: 3, width: 2, .. })
        ));
        assert!(matches!(
            store.load_context_column_in_node(ROOT_NODE_ID, 0),
            Err(StoreError::ContextIndexOutOfRange { k: 0, .. })
        ));
    }

    #[test]
    fn commit_split_moves_rows_and_stamps_children() {
        let store = store();
        let (inner, outer) = store.commit_split(ROOT_NODE_ID, &commit(&[1, 2, 3], &[4])).unwrap();
        assert_eq!((inner, outer), (2, 3));

        let root = store.fetch_node(ROOT_NODE_ID).unwrap().unwrap();
        assert_eq!(root.children(), Some((2, 3)));
        let child = store.fetch_node(inner).unwrap().unwrap();
        assert_eq!(child.parent, Some(ROOT_NODE_ID));
        assert_eq!(child.created_at, root.children_populated_at().unwrap());

        assert_eq!(store.bucket_of(4).unwrap(), Some(outer));
        let counts = store.bucket_counts().unwrap();
        assert_eq!(counts.get(&inner), Some(&3));
        assert_eq!(counts.get(&outer), Some(&1));
        assert_eq!(counts.get(&ROOT_NODE_ID), None);
    }

    #[test]
    fn rejected_commit_changes_nothing() {
        let store = store();
        let before = store.export();

        for bad in [
            commit(&[1, 2], &[4]),
            commit(&[1, 2, 3], &[3, 4]),
            commit(&[1, 2, 3, 4], &[]),
            commit(&[1, 2, 3, 9], &[4]),
        ] {
            assert!(matches!(
                store.commit_split(ROOT_NODE_ID, &bad),
                Err(StoreError::ConsistencyViolation { .. })
            ));
        }
        let mut wrong_count = commit(&[1, 2, 3], &[4]);
        wrong_count.inner.estimate.data_quantity = 2;
        assert!(store.commit_split(ROOT_NODE_ID, &wrong_count).is_err());
        assert!(matches!(
            store.commit_split(42, &commit(&[1], &[2])),
            Err(StoreError::NodeNotFound(42))
        ));

        assert_eq!(store.export(), before);
    }

    #[test]
    fn split_is_applied_once() {
        let store = store();
        store.commit_split(ROOT_NODE_ID, &commit(&[1, 2, 3], &[4])).unwrap();
        assert_eq!(
            store.commit_split(ROOT_NODE_ID, &commit(&[1, 2, 3], &[4])),
            Err(StoreError::NodeAlreadySplit(ROOT_NODE_ID))
        );
    }

    #[test]
    fn most_urgent_leaf_needs_a_tree() {
        let store = MemoryStore::new();
        assert_eq!(
            store.most_urgent_leaf(1, &BTreeSet::new()),
            Err(StoreError::NotInitialized)
        );
    }

    #[test]
    fn most_urgent_leaf_orders_by_loss_then_id() {
        let store = store();
        let none = BTreeSet::new();
        assert_eq!(store.most_urgent_leaf(1, &none).unwrap(), Some((1, 2.0)));

        let (inner, outer) = store.commit_split(ROOT_NODE_ID, &commit(&[1, 2, 3], &[4])).unwrap();
        store.set_estimate(outer, estimate("2.1", 1, 0.5)).unwrap();
        // Equal losses: lowest id wins.
        assert_eq!(store.most_urgent_leaf(1, &none).unwrap(), Some((inner, 0.5)));
        // Size threshold.
        assert_eq!(store.most_urgent_leaf(2, &none).unwrap(), Some((inner, 0.5)));
        assert_eq!(store.most_urgent_leaf(4, &none).unwrap(), None);
        // Exclusion and lock.
        let exclude: BTreeSet<NodeId> = [inner].into();
        assert_eq!(store.most_urgent_leaf(1, &exclude).unwrap(), Some((outer, 0.5)));
        assert!(store.try_reserve(outer).unwrap());
        assert!(!store.try_reserve(outer).unwrap());
        assert_eq!(store.most_urgent_leaf(1, &exclude).unwrap(), None);
        store.set_being_analysed(outer, false).unwrap();
        assert!(!store.try_reserve(ROOT_NODE_ID).unwrap());
    }

    #[test]
    fn prune_restores_leaf_and_rows() {
        let store = store();
        let (inner, _) = store.commit_split(ROOT_NODE_ID, &commit(&[1, 2, 3], &[4])).unwrap();
        let mut deeper = commit(&[1, 2], &[3]);
        deeper.context_k = 2;
        store.commit_split(inner, &deeper).unwrap();
        assert_eq!(store.node_count().unwrap(), 5);

        assert_eq!(store.prune(ROOT_NODE_ID).unwrap(), 4);
        assert_eq!(store.node_count().unwrap(), 1);
        assert!(store.fetch_node(ROOT_NODE_ID).unwrap().unwrap().is_leaf());
        assert_eq!(store.load_examples_in_node(ROOT_NODE_ID).unwrap().len(), 4);
        assert_eq!(store.prune(ROOT_NODE_ID).unwrap(), 0);

        // Fresh ids keep increasing.
        let (a, b) = store.commit_split(ROOT_NODE_ID, &commit(&[1, 2, 3], &[4])).unwrap();
        assert_eq!((a, b), (6, 7));
    }

    #[test]
    fn low_level_split_requires_attached_children() {
        let store = store();
        let inner = store.create_node(Some(ROOT_NODE_ID), estimate("1.2", 3, 0.5)).unwrap();
        let stray = store.create_node(None, estimate("2.1", 1, 0.0)).unwrap();
        assert!(matches!(
            store.update_node_split(ROOT_NODE_ID, 1, &p("1"), inner, stray),
            Err(StoreError::ConsistencyViolation { .. })
        ));
        let outer = store.create_node(Some(ROOT_NODE_ID), estimate("2.1", 1, 0.0)).unwrap();
        store.update_node_split(ROOT_NODE_ID, 1, &p("1"), inner, outer).unwrap();
        store.reassign_examples(&[1, 2, 3], inner).unwrap();
        store.reassign_examples(&[4], outer).unwrap();
        assert_eq!(store.bucket_of(3).unwrap(), Some(inner));
        assert_eq!(
            store.reassign_examples(&[99], inner),
            Err(StoreError::ExampleNotFound(99))
        );
    }

    #[test]
    fn unbucketed_rows_cannot_join_a_split_root() {
        let store = store();
        store.commit_split(ROOT_NODE_ID, &commit(&[1, 2, 3], &[4])).unwrap();
        store
            .insert_example(TrainingExample::parse(5, "1", &["1", "1"]).unwrap())
            .unwrap();
        assert!(matches!(
            store.init_root(),
            Err(StoreError::ConsistencyViolation { .. })
        ));
    }

    #[test]
    fn from_parts_round_trips_export() {
        let store = store();
        store.commit_split(ROOT_NODE_ID, &commit(&[1, 2, 3], &[4])).unwrap();
        let (examples, buckets, nodes) = store.export();
        let copy = MemoryStore::from_parts(examples, buckets, nodes, SystemClock).unwrap();
        assert_eq!(copy.export(), store.export());
        let id = copy.create_node(Some(2), estimate("1", 1, 0.0)).unwrap();
        assert_eq!(id, 4);
    }
}
