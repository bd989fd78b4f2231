//! Stochastic split search.
//!
//! # Overview
//!
//! A node is split on one context position `k` and one *region*: a path
//! prefix. Examples whose context value at `k` lies inside the region go to
//! the inner child, all others to the outer child. The best split is found by
//! random search:
//!
//! 1. Draw `split_trials` positions `k` uniformly from `1..=context_length`
//! 2. For each, gather every prefix of every context value at `k` in the node
//!    (the candidate regions)
//! 3. Draw `circles_per_split` regions; partition; skip trivial partitions
//! 4. Score each side with [`find_best_exemplar`] and sum the losses
//! 5. Keep the lowest sum; ties keep the earliest trial
//!
//! # Determinism
//!
//! Every trial's position and RNG seed are drawn from the caller's RNG before
//! any trial runs. Trials then run independently, sequentially or on rayon,
//! and are reduced in draw order, so both modes give the same split.

use std::collections::{BTreeMap, BTreeSet};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::ExampleId;
use crate::repr::{LeafEstimate, NodeId, PathValue};
use crate::store::{ChildCommit, RowStore, SplitCommit, StoreError, TreeStore};
use crate::utils::Parallelism;

use super::exemplar::{find_best_exemplar, ExemplarParams};
use super::TrainError;

// ============================================================================
// SplitParams
// ============================================================================

/// Search budget of one split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitParams {
    /// Context positions drawn.
    pub split_trials: usize,
    /// Regions drawn per position.
    pub circles_per_split: usize,
    /// Width of the context window; positions are drawn from `1..=context_length`.
    pub context_length: usize,
    /// Budget of each side's exemplar search.
    pub exemplar: ExemplarParams,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            split_trials: 100,
            circles_per_split: 10,
            context_length: 16,
            exemplar: ExemplarParams::default(),
        }
    }
}

// ============================================================================
// SplitCandidate
// ============================================================================

/// A scored split of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitCandidate {
    /// Node being split.
    pub node: NodeId,
    /// 1-based context position tested.
    pub context_k: usize,
    /// Region prefix.
    pub region: PathValue,
    /// Estimate over the inside examples.
    pub inside: LeafEstimate,
    /// Estimate over the outside examples.
    pub outside: LeafEstimate,
    /// Inside example ids, ascending.
    pub inside_ids: Vec<ExampleId>,
    /// Outside example ids, ascending.
    pub outside_ids: Vec<ExampleId>,
}

impl SplitCandidate {
    /// Combined estimated loss of both children.
    #[inline]
    pub fn total_loss(&self) -> f64 {
        self.inside.loss + self.outside.loss
    }

    /// The store operation that applies this split.
    pub fn to_commit(&self) -> SplitCommit {
        SplitCommit {
            context_k: self.context_k,
            region: self.region.clone(),
            inner: ChildCommit {
                estimate: self.inside.clone(),
                example_ids: self.inside_ids.clone(),
            },
            outer: ChildCommit {
                estimate: self.outside.clone(),
                example_ids: self.outside_ids.clone(),
            },
        }
    }
}

/// A committed split.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedSplit {
    pub candidate: SplitCandidate,
    /// Id of the new inner child.
    pub inner: NodeId,
    /// Id of the new outer child.
    pub outer: NodeId,
}

// ============================================================================
// Region helpers
// ============================================================================

/// Every prefix of every value, deduplicated and in path order.
///
/// `{1.2.3, 1.4, 2.3.4, 2.3.3}` gives `{1, 1.2, 1.2.3, 1.4, 2, 2.3, 2.3.3, 2.3.4}`.
pub fn candidate_regions<'a, I>(values: I) -> Vec<PathValue>
where
    I: IntoIterator<Item = &'a PathValue>,
{
    let mut regions = BTreeSet::new();
    for value in values {
        regions.extend(value.prefixes());
    }
    regions.into_iter().collect()
}

/// Indices of values inside and outside `region`.
pub fn partition<'a, I>(values: I, region: &PathValue) -> (Vec<usize>, Vec<usize>)
where
    I: IntoIterator<Item = &'a PathValue>,
{
    let mut inside = Vec::new();
    let mut outside = Vec::new();
    for (i, value) in values.into_iter().enumerate() {
        if region.contains(value) {
            inside.push(i);
        } else {
            outside.push(i);
        }
    }
    (inside, outside)
}

// ============================================================================
// SplitEngine
// ============================================================================

/// Context column of one node at one position.
struct Column {
    values: Vec<PathValue>,
    regions: Vec<PathValue>,
}

/// Searches for and commits node splits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitEngine {
    params: SplitParams,
    parallelism: Parallelism,
}

impl SplitEngine {
    pub fn new(params: SplitParams, parallelism: Parallelism) -> Self {
        Self {
            params,
            parallelism,
        }
    }

    #[inline]
    pub fn params(&self) -> &SplitParams {
        &self.params
    }

    /// Find the best split of `node` without modifying the store.
    ///
    /// # Errors
    ///
    /// - [`TrainError::NoFeasibleSplit`] if no trial produced two non-empty sides
    /// - [`TrainError::ContextIndexOutOfRange`] if an example is narrower than
    ///   `context_length`
    pub fn find_split<S, R>(
        &self,
        store: &S,
        node: NodeId,
        rng: &mut R,
    ) -> Result<SplitCandidate, TrainError>
    where
        S: RowStore + ?Sized,
        R: Rng + ?Sized,
    {
        let examples = store.load_examples_in_node(node)?;
        let context_length = self.params.context_length.max(1);
        let plan: Vec<(usize, u64)> = (0..self.params.split_trials)
            .map(|_| (rng.gen_range(1..=context_length), rng.gen::<u64>()))
            .collect();
        if examples.is_empty() {
            return Err(TrainError::NoFeasibleSplit { node });
        }

        let ids: Vec<ExampleId> = examples.iter().map(|e| e.id).collect();
        let targets: Vec<PathValue> = examples.into_iter().map(|e| e.target).collect();

        let mut columns: BTreeMap<usize, Column> = BTreeMap::new();
        for &(k, _) in &plan {
            if columns.contains_key(&k) {
                continue;
            }
            let loaded = store.load_context_column_in_node(node, k)?;
            if loaded.len() != ids.len() || loaded.iter().zip(&ids).any(|((a, _), b)| a != b) {
                return Err(StoreError::violation(format!(
                    "context column {k} of node {node} does not line up with its examples"
                ))
                .into());
            }
            let values: Vec<PathValue> = loaded.into_iter().map(|(_, v)| v).collect();
            let regions = candidate_regions(&values);
            columns.insert(k, Column { values, regions });
        }

        let trials = self.parallelism.maybe_par_map(plan, |(k, seed)| {
            let column = &columns[&k];
            self.run_trial(node, k, column, &ids, &targets, seed)
        });

        let mut best: Option<SplitCandidate> = None;
        for trial in trials {
            if let Some(candidate) = trial? {
                if best
                    .as_ref()
                    .map_or(true, |b| candidate.total_loss() < b.total_loss())
                {
                    best = Some(candidate);
                }
            }
        }
        best.ok_or(TrainError::NoFeasibleSplit { node })
    }

    /// Find the best split of `node` and commit it atomically.
    pub fn split<S, R>(&self, store: &S, node: NodeId, rng: &mut R) -> Result<AppliedSplit, TrainError>
    where
        S: TreeStore + ?Sized,
        R: Rng + ?Sized,
    {
        let candidate = self.find_split(store, node, rng)?;
        let (inner, outer) = store.commit_split(node, &candidate.to_commit())?;
        Ok(AppliedSplit {
            candidate,
            inner,
            outer,
        })
    }

    fn run_trial(
        &self,
        node: NodeId,
        k: usize,
        column: &Column,
        ids: &[ExampleId],
        targets: &[PathValue],
        seed: u64,
    ) -> Result<Option<SplitCandidate>, TrainError> {
        if column.regions.is_empty() {
            return Ok(None);
        }
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut best: Option<SplitCandidate> = None;

        for _ in 0..self.params.circles_per_split {
            let region = &column.regions[rng.gen_range(0..column.regions.len())];
            let (inside, outside) = partition(&column.values, region);
            if inside.is_empty() || outside.is_empty() {
                continue;
            }
            let inside_targets: Vec<&PathValue> = inside.iter().map(|&i| &targets[i]).collect();
            let outside_targets: Vec<&PathValue> = outside.iter().map(|&i| &targets[i]).collect();
            let inside_est = find_best_exemplar(&inside_targets, &self.params.exemplar, &mut rng)?;
            let outside_est = find_best_exemplar(&outside_targets, &self.params.exemplar, &mut rng)?;

            let total = inside_est.loss + outside_est.loss;
            if best.as_ref().map_or(true, |b| total < b.total_loss()) {
                best = Some(SplitCandidate {
                    node,
                    context_k: k,
                    region: region.clone(),
                    inside: inside_est,
                    outside: outside_est,
                    inside_ids: inside.iter().map(|&i| ids[i]).collect(),
                    outside_ids: outside.iter().map(|&i| ids[i]).collect(),
                });
            }
        }
        Ok(best)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TrainingExample;
    use crate::repr::ROOT_NODE_ID;
    use crate::store::{MemoryStore, NodeStore};
    use approx::assert_relative_eq;

    fn p(s: &str) -> PathValue {
        s.parse().unwrap()
    }

    fn params(context_length: usize) -> SplitParams {
        SplitParams {
            split_trials: 20,
            circles_per_split: 10,
            context_length,
            exemplar: ExemplarParams {
                exemplar_trials: 30,
                cost_trials: 30,
            },
        }
    }

    fn seeded_store(rows: &[(&str, &[&str])]) -> MemoryStore {
        let examples = rows
            .iter()
            .enumerate()
            .map(|(i, (t, c))| TrainingExample::parse(i as u64 + 1, t, c).unwrap());
        let store = MemoryStore::from_examples(examples).unwrap();
        store.init_root().unwrap();
        store
    }

    #[test]
    fn regions_cover_every_prefix_once() {
        let values = [p("1.2.3"), p("1.4"), p("2.3.4"), p("2.3.3")];
        let regions: Vec<String> = candidate_regions(&values).iter().map(|r| r.to_string()).collect();
        assert_eq!(regions, vec!["1", "1.2", "1.2.3", "1.4", "2", "2.3", "2.3.3", "2.3.4"]);
    }

    #[test]
    fn partition_is_component_wise() {
        let values = [p("1.2"), p("12.1"), p("1"), p("3.1")];
        let (inside, outside) = partition(&values, &p("1"));
        assert_eq!(inside, vec![0, 2]);
        assert_eq!(outside, vec![1, 3]);
    }

    #[test]
    fn end_to_end_three_examples() {
        let store = seeded_store(&[("1.2", &["1.2"]), ("1.2", &["1.2"]), ("3.1", &["3.1"])]);
        let engine = SplitEngine::new(params(1), Parallelism::Sequential);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let applied = engine.split(&store, ROOT_NODE_ID, &mut rng).unwrap();
        let c = &applied.candidate;

        assert_eq!(c.context_k, 1);
        assert_relative_eq!(c.total_loss(), 0.75);
        // Every region separates the "1" branch from the "3" branch; which
        // side is "inside" depends on the region drawn first.
        let (ones, threes) = if p("1").is_prefix_of(&c.region) {
            (&c.inside, &c.outside)
        } else {
            (&c.outside, &c.inside)
        };
        assert_eq!(ones.exemplar, p("1.2"));
        assert_eq!(ones.data_quantity, 2);
        assert_relative_eq!(ones.loss, 0.5);
        assert_eq!(threes.exemplar, p("3.1"));
        assert_relative_eq!(threes.loss, 0.25);

        let mut all: Vec<ExampleId> = c.inside_ids.iter().chain(&c.outside_ids).copied().collect();
        all.sort_unstable();
        assert_eq!(all, vec![1, 2, 3]);
        let inner = store.fetch_node(applied.inner).unwrap().unwrap();
        assert_eq!(inner.data_quantity(), Some(c.inside_ids.len()));
        assert_eq!(store.bucket_of(c.outside_ids[0]).unwrap(), Some(applied.outer));
    }

    #[test]
    fn identical_context_is_infeasible() {
        let store = seeded_store(&[("1.2", &["4.4"]), ("3.1", &["4.4"])]);
        let engine = SplitEngine::new(params(1), Parallelism::Sequential);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let before = store.export();
        assert!(matches!(
            engine.split(&store, ROOT_NODE_ID, &mut rng),
            Err(TrainError::NoFeasibleSplit { node: ROOT_NODE_ID })
        ));
        assert_eq!(store.export(), before);
    }

    #[test]
    fn narrow_examples_are_reported() {
        let store = seeded_store(&[("1.2", &["1.2"]), ("3.1", &["3.1"])]);
        let engine = SplitEngine::new(params(2), Parallelism::Sequential);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        assert!(matches!(
            engine.find_split(&store, ROOT_NODE_ID, &mut rng),
            Err(TrainError::ContextIndexOutOfRange { k: 2, .. })
        ));
    }

    #[test]
    fn parallel_search_matches_sequential() {
        let rows: Vec<(String, Vec<String>)> = (0..40u32)
            .map(|i| {
                let target = format!("{}.{}", i % 3 + 1, i % 5);
                let ctx = vec![format!("{}.{}", i % 4 + 1, i % 3), format!("{}", i % 2 + 7)];
                (target, ctx)
            })
            .collect();
        let borrowed: Vec<(&str, Vec<&str>)> = rows
            .iter()
            .map(|(t, c)| (t.as_str(), c.iter().map(String::as_str).collect()))
            .collect();
        let rows: Vec<(&str, &[&str])> = borrowed.iter().map(|(t, c)| (*t, c.as_slice())).collect();

        let store = seeded_store(&rows);
        let seq = SplitEngine::new(params(2), Parallelism::Sequential);
        let par = SplitEngine::new(params(2), Parallelism::Parallel);
        let a = seq
            .find_split(&store, ROOT_NODE_ID, &mut Xoshiro256PlusPlus::seed_from_u64(9))
            .unwrap();
        let b = par
            .find_split(&store, ROOT_NODE_ID, &mut Xoshiro256PlusPlus::seed_from_u64(9))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.inside_ids.len() + a.outside_ids.len(), 40);
    }
}
