//! Tree growth.
//!
//! - [`find_best_exemplar`]: Monte-Carlo estimate of a set's representative path
//! - [`SplitEngine`]: random search for the best inside/outside split of a leaf
//! - [`TrainingScheduler`]: leaf-wise growth loop with bootstrap and stop conditions
//! - [`TrainingConfig`]: validated run configuration
//! - [`TrainingLogger`], [`Verbosity`]: progress reporting

mod config;
mod exemplar;
mod logger;
mod scheduler;
mod split;
mod stopping;

pub use config::{ConfigError, InfeasiblePolicy, TrainingConfig};
pub use exemplar::{find_best_exemplar, total_cost, ExemplarParams};
pub use logger::{TrainingLogger, Verbosity};
pub use scheduler::{SchedulerState, SplitReport, StepOutcome, TrainingScheduler, TrainingSummary};
pub use split::{candidate_regions, partition, AppliedSplit, SplitCandidate, SplitEngine, SplitParams};
pub use stopping::{CancellationToken, GateError, StopConditions, StopReason, TrainingGate};

use thiserror::Error;

use crate::data::ExampleId;
use crate::repr::NodeId;
use crate::store::StoreError;

/// Training errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainError {
    /// An exemplar search or bootstrap was given no examples.
    #[error("no examples to estimate from")]
    EmptyInput,

    /// Every trial left one side of the split empty.
    #[error("node {node} has no feasible split")]
    NoFeasibleSplit { node: NodeId },

    /// An example has no value at a drawn context position.
    #[error("context position {k} is out of range for example {example} (window of {width})")]
    ContextIndexOutOfRange {
        k: usize,
        example: ExampleId,
        width: usize,
    },

    /// Another split holds the node's analysis lock.
    #[error("node {node} is being analysed by another worker")]
    NodeBusy { node: NodeId },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TrainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ContextIndexOutOfRange { k, example, width } => {
                TrainError::ContextIndexOutOfRange { k, example, width }
            }
            other => TrainError::Store(other),
        }
    }
}
