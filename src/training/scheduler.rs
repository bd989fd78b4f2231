//! Leaf-wise tree growth.
//!
//! The scheduler repeatedly picks the leaf with the highest estimated loss
//! and splits it, like a best-first (leaf-wise) grower:
//!
//! ```text
//! Uninitialized -> Bootstrapping -> Ready -> (SelectingNode -> Splitting -> Ready)* -> Converged
//! ```
//!
//! A selected node is reserved through its `being_analysed` flag for the
//! duration of the split. The reservation is released when the split
//! finishes, whether it succeeded or not.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::warn;

use crate::data::{Decoder, NoDecoder};
use crate::repr::{LeafEstimate, NodeId, PathValue, ROOT_NODE_ID};
use crate::store::{NodeStore, StoreError, TreeStore};

use super::config::{InfeasiblePolicy, TrainingConfig};
use super::exemplar::find_best_exemplar;
use super::logger::{TrainingLogger, Verbosity};
use super::split::SplitEngine;
use super::stopping::{StopConditions, StopReason};
use super::TrainError;

// ============================================================================
// Reports
// ============================================================================

/// Lifecycle of a [`TrainingScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Uninitialized,
    Bootstrapping,
    Ready,
    SelectingNode,
    Splitting,
    Converged,
}

/// One committed split.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitReport {
    /// The node that acquired children.
    pub node: NodeId,
    /// Its loss before the split.
    pub parent_loss: f64,
    pub context_k: usize,
    pub region: PathValue,
    /// New inner child.
    pub inner: NodeId,
    /// New outer child.
    pub outer: NodeId,
    pub inside: LeafEstimate,
    pub outside: LeafEstimate,
    pub elapsed: Duration,
}

impl SplitReport {
    #[inline]
    pub fn total_loss(&self) -> f64 {
        self.inside.loss + self.outside.loss
    }

    /// `parent_loss - total_loss`. Can be negative: losses are estimates.
    #[inline]
    pub fn improvement(&self) -> f64 {
        self.parent_loss - self.total_loss()
    }
}

/// Result of one [`TrainingScheduler::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Split(SplitReport),
    Converged,
}

/// Result of [`TrainingScheduler::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    /// Splits committed by this run.
    pub splits: usize,
    pub stop_reason: StopReason,
    /// Sum of [`SplitReport::improvement`] over this run.
    pub total_improvement: f64,
    /// Leaves found unsplittable, in discovery order.
    pub infeasible: Vec<NodeId>,
    pub elapsed: Duration,
}

// ============================================================================
// AnalysisLock
// ============================================================================

/// Holds a node's `being_analysed` flag; clears it on drop.
struct AnalysisLock<S: NodeStore + ?Sized> {
    store: Arc<S>,
    node: NodeId,
}

impl<S: NodeStore + ?Sized> AnalysisLock<S> {
    fn acquire(store: &Arc<S>, node: NodeId) -> Result<Option<Self>, StoreError> {
        if store.try_reserve(node)? {
            Ok(Some(Self {
                store: Arc::clone(store),
                node,
            }))
        } else {
            Ok(None)
        }
    }
}

impl<S: NodeStore + ?Sized> Drop for AnalysisLock<S> {
    fn drop(&mut self) {
        if let Err(error) = self.store.set_being_analysed(self.node, false) {
            warn!(node = self.node, %error, "failed to release analysis lock");
        }
    }
}

// ============================================================================
// TrainingScheduler
// ============================================================================

/// Drives tree growth over a shared store.
pub struct TrainingScheduler<S: TreeStore + ?Sized> {
    store: Arc<S>,
    config: TrainingConfig,
    engine: SplitEngine,
    rng: Xoshiro256PlusPlus,
    state: SchedulerState,
    logger: TrainingLogger,
    decoder: Option<Box<dyn Decoder + Send + Sync>>,
    infeasible: BTreeSet<NodeId>,
    infeasible_order: Vec<NodeId>,
    splits_done: usize,
}

impl<S: TreeStore + ?Sized> TrainingScheduler<S> {
    pub fn new(store: Arc<S>, config: TrainingConfig) -> Self {
        let engine = SplitEngine::new(config.split_params(), config.parallelism);
        Self {
            store,
            rng: Xoshiro256PlusPlus::seed_from_u64(config.seed),
            logger: TrainingLogger::new(config.verbosity),
            engine,
            config,
            state: SchedulerState::Uninitialized,
            decoder: None,
            infeasible: BTreeSet::new(),
            infeasible_order: Vec::new(),
            splits_done: 0,
        }
    }

    /// Use `decoder` to label paths in log messages.
    pub fn with_decoder(mut self, decoder: impl Decoder + Send + Sync + 'static) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    #[inline]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    #[inline]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[inline]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Splits committed by this scheduler so far.
    #[inline]
    pub fn splits_done(&self) -> usize {
        self.splits_done
    }

    /// Leaves skipped as unsplittable during this scheduler's lifetime.
    pub fn infeasible_nodes(&self) -> &[NodeId] {
        &self.infeasible_order
    }

    /// Make sure the root exists, holds every example and has an estimate.
    ///
    /// Does nothing if the root already has an estimate and every example is
    /// bucketed. Returns the new root estimate if one was computed.
    pub fn bootstrap(&mut self) -> Result<Option<LeafEstimate>, TrainError> {
        self.state = SchedulerState::Bootstrapping;
        let n_examples = self.store.example_count()?;
        if n_examples == 0 {
            self.state = SchedulerState::Uninitialized;
            return Err(TrainError::EmptyInput);
        }

        let root = self.store.fetch_node(ROOT_NODE_ID)?;
        let bucketed = self.store.bucketed_count()?;
        let ready = root.as_ref().is_some_and(|r| r.estimate.is_some()) && bucketed == n_examples;
        if ready {
            self.state = SchedulerState::Ready;
            return Ok(None);
        }

        if let Err(e) = self.store.init_root() {
            self.state = SchedulerState::Uninitialized;
            return Err(e.into());
        }
        let examples = self.store.load_examples_in_node(ROOT_NODE_ID)?;
        let targets: Vec<&PathValue> = examples.iter().map(|e| &e.target).collect();
        let estimate = match find_best_exemplar(&targets, &self.config.exemplar_params(), &mut self.rng) {
            Ok(estimate) => estimate,
            Err(e) => {
                self.state = SchedulerState::Uninitialized;
                return Err(e);
            }
        };
        self.store.set_estimate(ROOT_NODE_ID, estimate.clone())?;
        self.logger.log_bootstrap(&estimate);
        self.state = SchedulerState::Ready;
        Ok(Some(estimate))
    }

    /// Select the most urgent leaf and split it.
    ///
    /// Bootstraps first if needed. With [`InfeasiblePolicy::Skip`], leaves that
    /// cannot be split are passed over and the next candidate is tried.
    pub fn step(&mut self) -> Result<StepOutcome, TrainError> {
        match self.state {
            SchedulerState::Converged => return Ok(StepOutcome::Converged),
            SchedulerState::Uninitialized => {
                self.bootstrap()?;
            }
            _ => {}
        }

        loop {
            self.state = SchedulerState::SelectingNode;
            let selected = self
                .store
                .most_urgent_leaf(self.config.min_node_size, &self.infeasible)?;
            let Some((node, loss)) = selected else {
                self.state = SchedulerState::Converged;
                self.logger.log_converged();
                return Ok(StepOutcome::Converged);
            };
            if self.logger.enabled(Verbosity::Info) {
                let ancestry = self.ancestry(node);
                self.logger.log_selection(node, loss, &ancestry);
            }

            self.state = SchedulerState::Splitting;
            match self.split_reserved(node, loss) {
                Ok(Some(report)) => {
                    self.state = SchedulerState::Ready;
                    return Ok(StepOutcome::Split(report));
                }
                // Taken by another scheduler between selection and reservation.
                Ok(None) => continue,
                Err(TrainError::NoFeasibleSplit { node })
                    if self.config.infeasible == InfeasiblePolicy::Skip =>
                {
                    self.mark_infeasible(node);
                }
                Err(e) => {
                    self.state = SchedulerState::Ready;
                    return Err(e);
                }
            }
        }
    }

    /// Split one given leaf, regardless of its urgency.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NodeNotFound`] / [`StoreError::NodeAlreadySplit`] wrapped in
    ///   [`TrainError::Store`]
    /// - [`TrainError::NodeBusy`] if another split holds the node
    /// - [`TrainError::NoFeasibleSplit`] whatever the infeasible policy
    pub fn split_node(&mut self, node: NodeId) -> Result<SplitReport, TrainError> {
        if matches!(self.state, SchedulerState::Uninitialized) {
            self.bootstrap()?;
        }
        let current = self
            .store
            .fetch_node(node)?
            .ok_or(StoreError::NodeNotFound(node))?;
        if current.has_children() {
            return Err(StoreError::NodeAlreadySplit(node).into());
        }
        let loss = current.loss().unwrap_or(0.0);

        let previous = self.state;
        self.state = SchedulerState::Splitting;
        let result = self.split_reserved(node, loss);
        self.state = match previous {
            SchedulerState::Converged => SchedulerState::Converged,
            _ => SchedulerState::Ready,
        };
        result?.ok_or(TrainError::NodeBusy { node })
    }

    /// Grow until a stop condition holds or no splittable leaf remains.
    pub fn run(&mut self, stop: &StopConditions) -> Result<TrainingSummary, TrainError> {
        let started = Instant::now();
        if matches!(self.state, SchedulerState::Uninitialized) {
            self.bootstrap()?;
        }
        self.logger
            .start_training(self.store.example_count()?, stop.max_splits);

        let mut splits = 0;
        let mut total_improvement = 0.0;
        let infeasible_before = self.infeasible_order.len();
        let stop_reason = loop {
            if let Some(reason) = stop.reached(splits) {
                break reason;
            }
            if let Some(gate) = &stop.gate {
                match gate.may_proceed() {
                    Ok(true) => {}
                    Ok(false) => {
                        self.logger.log_gate_pause(stop.gate_backoff);
                        stop.pause();
                        continue;
                    }
                    Err(error) => self.logger.log_gate_error(error.as_ref()),
                }
            }
            match self.step()? {
                StepOutcome::Split(report) => {
                    splits += 1;
                    total_improvement += report.improvement();
                }
                StepOutcome::Converged => break StopReason::Converged,
            }
        };

        let summary = TrainingSummary {
            splits,
            stop_reason,
            total_improvement,
            infeasible: self.infeasible_order[infeasible_before..].to_vec(),
            elapsed: started.elapsed(),
        };
        self.logger.finish_training(&summary);
        Ok(summary)
    }

    /// Reserve `node`, split it, release it. `Ok(None)` if it could not be reserved.
    fn split_reserved(&mut self, node: NodeId, parent_loss: f64) -> Result<Option<SplitReport>, TrainError> {
        let started = Instant::now();
        let Some(_lock) = AnalysisLock::acquire(&self.store, node)? else {
            return Ok(None);
        };
        let applied = self.engine.split(&*self.store, node, &mut self.rng)?;
        let candidate = applied.candidate;
        let report = SplitReport {
            node,
            parent_loss,
            context_k: candidate.context_k,
            region: candidate.region,
            inner: applied.inner,
            outer: applied.outer,
            inside: candidate.inside,
            outside: candidate.outside,
            elapsed: started.elapsed(),
        };
        self.splits_done += 1;
        self.logger.log_split(self.splits_done, &report);
        Ok(Some(report))
    }

    fn mark_infeasible(&mut self, node: NodeId) {
        if self.infeasible.insert(node) {
            self.infeasible_order.push(node);
        }
        self.logger.log_infeasible(node);
    }

    fn ancestry(&self, node: NodeId) -> String {
        let decoder: &dyn Decoder = match &self.decoder {
            Some(d) => d.as_ref(),
            None => &NoDecoder,
        };
        match self.store.snapshot() {
            Ok(snapshot) => snapshot.describe_ancestry(node, decoder),
            Err(error) => format!("<unavailable: {error}>"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TrainingExample;
    use crate::store::{ensure_consistent, MemoryStore, RowStore};

    fn config() -> TrainingConfig {
        TrainingConfig::builder()
            .exemplar_trials(20)
            .cost_trials(20)
            .split_trials(10)
            .circles_per_split(5)
            .context_length(1)
            .build()
            .unwrap()
    }

    fn store(rows: &[(&str, &str)]) -> Arc<MemoryStore> {
        let examples = rows
            .iter()
            .enumerate()
            .map(|(i, (t, c))| TrainingExample::parse(i as u64 + 1, t, &[c]).unwrap());
        Arc::new(MemoryStore::from_examples(examples).unwrap())
    }

    #[test]
    fn empty_store_cannot_bootstrap() {
        let mut scheduler = TrainingScheduler::new(Arc::new(MemoryStore::new()), config());
        assert!(matches!(scheduler.bootstrap(), Err(TrainError::EmptyInput)));
        assert_eq!(scheduler.state(), SchedulerState::Uninitialized);
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let store = store(&[("1.2", "1.2"), ("3.1", "3.1")]);
        let mut scheduler = TrainingScheduler::new(Arc::clone(&store), config());
        let estimate = scheduler.bootstrap().unwrap().unwrap();
        assert_eq!(estimate.data_quantity, 2);
        assert_eq!(scheduler.state(), SchedulerState::Ready);
        assert!(scheduler.bootstrap().unwrap().is_none());
        ensure_consistent(store.as_ref()).unwrap();
    }

    #[test]
    fn steps_until_converged() {
        let store = store(&[("1.2", "1.2"), ("1.2", "1.2"), ("3.1", "3.1")]);
        let mut scheduler = TrainingScheduler::new(Arc::clone(&store), config());

        let StepOutcome::Split(report) = scheduler.step().unwrap() else {
            panic!("expected a split");
        };
        assert_eq!(report.node, ROOT_NODE_ID);
        assert_eq!(report.inside.data_quantity + report.outside.data_quantity, 3);
        ensure_consistent(store.as_ref()).unwrap();

        // The two "1.2" rows share their context; nothing else can be split.
        assert_eq!(scheduler.step().unwrap(), StepOutcome::Converged);
        assert_eq!(scheduler.state(), SchedulerState::Converged);
        assert_eq!(scheduler.step().unwrap(), StepOutcome::Converged);
        assert!(!scheduler.infeasible_nodes().is_empty());
        let report = ensure_consistent(store.as_ref()).unwrap();
        assert!(report.locked_nodes.is_empty());
    }

    #[test]
    fn fail_policy_surfaces_infeasible_and_releases_lock() {
        let store = store(&[("1.2", "4"), ("3.1", "4")]);
        let config = TrainingConfig {
            infeasible: InfeasiblePolicy::Fail,
            ..config()
        };
        let mut scheduler = TrainingScheduler::new(Arc::clone(&store), config);
        assert!(matches!(
            scheduler.step(),
            Err(TrainError::NoFeasibleSplit { node: ROOT_NODE_ID })
        ));
        let root = store.fetch_node(ROOT_NODE_ID).unwrap().unwrap();
        assert!(!root.being_analysed);
        assert!(root.is_leaf());
    }

    #[test]
    fn split_node_rejects_internal_and_busy_nodes() {
        let store = store(&[("1.2", "1.2"), ("3.1", "3.1")]);
        let mut scheduler = TrainingScheduler::new(Arc::clone(&store), config());
        scheduler.bootstrap().unwrap();

        store.set_being_analysed(ROOT_NODE_ID, true).unwrap();
        assert!(matches!(
            scheduler.split_node(ROOT_NODE_ID),
            Err(TrainError::NodeBusy { node: ROOT_NODE_ID })
        ));
        store.set_being_analysed(ROOT_NODE_ID, false).unwrap();

        let report = scheduler.split_node(ROOT_NODE_ID).unwrap();
        assert_eq!(store.bucket_counts().unwrap().len(), 2);
        assert!(matches!(
            scheduler.split_node(ROOT_NODE_ID),
            Err(TrainError::Store(StoreError::NodeAlreadySplit(ROOT_NODE_ID)))
        ));
        assert!(matches!(
            scheduler.split_node(99),
            Err(TrainError::Store(StoreError::NodeNotFound(99)))
        ));
        assert_eq!(report.parent_loss, store.fetch_node(1).unwrap().unwrap().loss().unwrap());
    }

    #[test]
    fn run_respects_max_splits() {
        let rows: Vec<(String, String)> = (0..12u32)
            .map(|i| (format!("{}.{}", i % 4 + 1, i % 3), format!("{}.{}", i % 4 + 1, i % 2)))
            .collect();
        let borrowed: Vec<(&str, &str)> = rows.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let store = store(&borrowed);
        let mut scheduler = TrainingScheduler::new(Arc::clone(&store), config());
        let summary = scheduler.run(&StopConditions::after_splits(2)).unwrap();
        assert_eq!(summary.splits, 2);
        assert_eq!(summary.stop_reason, StopReason::MaxSplits);
        assert_eq!(store.node_count().unwrap(), 5);
        ensure_consistent(store.as_ref()).unwrap();
    }
}
