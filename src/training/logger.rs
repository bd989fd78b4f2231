//! Training progress logging.
//!
//! Events go through `tracing`; [`Verbosity`] decides which are emitted at
//! all, so a silent run never formats a message.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::repr::{LeafEstimate, NodeId};

use super::scheduler::{SplitReport, TrainingSummary};

/// How much a training run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Verbosity {
    /// Nothing.
    #[default]
    Silent,
    /// Problems only.
    Warning,
    /// Bootstrap, node selection, splits and the final summary.
    Info,
    /// Everything, including per-step timings.
    Debug,
}

/// Emits training events at the configured verbosity.
#[derive(Debug, Clone)]
pub struct TrainingLogger {
    verbosity: Verbosity,
    started: Option<Instant>,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            started: None,
        }
    }

    #[inline]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    #[inline]
    pub fn enabled(&self, level: Verbosity) -> bool {
        level != Verbosity::Silent && self.verbosity >= level
    }

    /// Time since [`start_training`](Self::start_training).
    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    pub fn start_training(&mut self, n_examples: usize, max_splits: Option<usize>) {
        self.started = Some(Instant::now());
        if self.enabled(Verbosity::Info) {
            match max_splits {
                Some(max) => info!(n_examples, max_splits = max, "training started"),
                None => info!(n_examples, "training started"),
            }
        }
    }

    pub fn log_bootstrap(&self, estimate: &LeafEstimate) {
        if self.enabled(Verbosity::Info) {
            info!(
                node = crate::repr::ROOT_NODE_ID,
                exemplar = %estimate.exemplar,
                loss = estimate.loss,
                data_quantity = estimate.data_quantity,
                "root initialised"
            );
        }
    }

    pub fn log_selection(&self, node: NodeId, loss: f64, ancestry: &str) {
        if self.enabled(Verbosity::Info) {
            info!(node, loss, ancestry, "splitting most urgent node");
        }
    }

    pub fn log_split(&self, split_number: usize, report: &SplitReport) {
        if self.enabled(Verbosity::Info) {
            info!(
                split = split_number,
                node = report.node,
                context_k = report.context_k,
                region = %report.region,
                inner = report.inner,
                inner_exemplar = %report.inside.exemplar,
                inner_size = report.inside.data_quantity,
                outer = report.outer,
                outer_exemplar = %report.outside.exemplar,
                outer_size = report.outside.data_quantity,
                total_loss = report.total_loss(),
                improvement = report.improvement(),
                "split committed"
            );
        }
        if self.enabled(Verbosity::Debug) {
            debug!(node = report.node, elapsed_ms = report.elapsed.as_millis() as u64, "split timing");
        }
    }

    pub fn log_infeasible(&self, node: NodeId) {
        if self.enabled(Verbosity::Warning) {
            warn!(node, "no feasible split; node skipped for the rest of the run");
        }
    }

    pub fn log_gate_pause(&self, backoff: Duration) {
        if self.enabled(Verbosity::Info) {
            info!(backoff_secs = backoff.as_secs_f64(), "training gate closed; pausing");
        }
    }

    pub fn log_gate_error(&self, error: &dyn std::error::Error) {
        if self.enabled(Verbosity::Warning) {
            warn!(%error, "training gate check failed; continuing");
        }
    }

    pub fn log_converged(&self) {
        if self.enabled(Verbosity::Info) {
            info!("no splittable leaves remain; training converged");
        }
    }

    pub fn finish_training(&self, summary: &TrainingSummary) {
        if self.enabled(Verbosity::Info) {
            info!(
                splits = summary.splits,
                reason = ?summary.stop_reason,
                improvement = summary.total_improvement,
                skipped = summary.infeasible.len(),
                elapsed_secs = self.elapsed().as_secs_f64(),
                "training finished"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels_are_ordered() {
        assert!(Verbosity::Silent < Verbosity::Warning);
        assert!(Verbosity::Info < Verbosity::Debug);
        assert_eq!(Verbosity::default(), Verbosity::Silent);
    }

    #[test]
    fn enabled_respects_threshold() {
        let logger = TrainingLogger::new(Verbosity::Info);
        assert!(logger.enabled(Verbosity::Warning));
        assert!(logger.enabled(Verbosity::Info));
        assert!(!logger.enabled(Verbosity::Debug));
        assert!(!logger.enabled(Verbosity::Silent));

        let silent = TrainingLogger::new(Verbosity::Silent);
        assert!(!silent.enabled(Verbosity::Warning));
        assert_eq!(silent.elapsed(), Duration::ZERO);
    }
}
