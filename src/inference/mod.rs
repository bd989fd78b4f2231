//! Prediction with grown trees.
//!
//! - [`InferenceEngine`]: root-to-leaf traversal of one frozen tree
//! - [`EnsemblePredictor`]: consensus over several predictors
//! - [`evaluate`]: loss and traversal statistics over labelled examples
//!
//! All predictors implement [`PathPredictor`].

mod engine;
mod ensemble;
mod evaluate;

pub use engine::InferenceEngine;
pub use ensemble::{consensus_index, EnsemblePredictor};
pub use evaluate::{evaluate, EvaluationRecord, EvaluationReport};

use serde::Serialize;
use thiserror::Error;

use crate::repr::{NodeId, PathParseError, PathValue};
use crate::store::StoreError;

/// Inference errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// A node tests a context position the query does not have.
    #[error("node {node} tests context position {k}, but the context has {len} values")]
    ContextIndexOutOfRange { node: NodeId, k: usize, len: usize },

    /// The snapshot has no root node.
    #[error("tree has no root node")]
    RootNotFound,

    /// A split points at a node missing from the snapshot.
    #[error("node {node} references missing child {child}")]
    DanglingChildReference { node: NodeId, child: NodeId },

    /// Traversal revisited a node.
    #[error("traversal revisited node {node}")]
    CycleDetected { node: NodeId },

    /// The reached leaf has no exemplar.
    #[error("leaf {node} has no prediction")]
    MalformedPrediction { node: NodeId },

    /// An ensemble with no members.
    #[error("ensemble has no models")]
    EmptyEnsemble,

    #[error("malformed context: {0}")]
    Path(#[from] PathParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    /// Leaf the traversal ended at.
    pub leaf: NodeId,
    /// The leaf's exemplar.
    pub predicted: PathValue,
    /// Splits passed on the way.
    pub depth: usize,
    /// How many of those sent the query inside.
    pub inner_matches: usize,
}

/// Anything that predicts a path from a context window.
pub trait PathPredictor {
    fn predict(&self, context: &[PathValue]) -> Result<Prediction, InferenceError>;
}

impl<P: PathPredictor + ?Sized> PathPredictor for &P {
    fn predict(&self, context: &[PathValue]) -> Result<Prediction, InferenceError> {
        (**self).predict(context)
    }
}

impl<P: PathPredictor + ?Sized> PathPredictor for Box<P> {
    fn predict(&self, context: &[PathValue]) -> Result<Prediction, InferenceError> {
        (**self).predict(context)
    }
}
