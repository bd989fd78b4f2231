//! Consensus over several independently grown trees.

use tracing::warn;

use crate::repr::{cost, PathValue};

use super::{InferenceEngine, InferenceError, PathPredictor, Prediction};

/// Index of the path with the lowest summed cost to all the others.
///
/// Ties go to the earliest index. `None` for an empty slice.
pub fn consensus_index(paths: &[PathValue]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in paths.iter().enumerate() {
        let total: f64 = paths
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, other)| cost(candidate, other))
            .sum();
        if best.map_or(true, |(_, lowest)| total < lowest) {
            best = Some((i, total));
        }
    }
    best.map(|(i, _)| i)
}

/// Predicts with every member and keeps the consensus prediction.
///
/// Members that fail are left out of the vote; the ensemble fails only when
/// every member does, with the first member's error.
#[derive(Debug)]
pub struct EnsemblePredictor<P = InferenceEngine> {
    members: Vec<P>,
}

impl<P: PathPredictor> EnsemblePredictor<P> {
    pub fn new(members: Vec<P>) -> Self {
        Self { members }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[P] {
        &self.members
    }

    /// Every member's outcome, in member order.
    pub fn predict_all(&self, context: &[PathValue]) -> Vec<Result<Prediction, InferenceError>> {
        self.members.iter().map(|m| m.predict(context)).collect()
    }
}

impl<P: PathPredictor> PathPredictor for EnsemblePredictor<P> {
    fn predict(&self, context: &[PathValue]) -> Result<Prediction, InferenceError> {
        if self.members.is_empty() {
            return Err(InferenceError::EmptyEnsemble);
        }
        let mut predictions = Vec::with_capacity(self.members.len());
        let mut first_error = None;
        for (member, outcome) in self.predict_all(context).into_iter().enumerate() {
            match outcome {
                Ok(prediction) => predictions.push(prediction),
                Err(error) => {
                    warn!(member, %error, "ensemble member failed; excluded from vote");
                    first_error.get_or_insert(error);
                }
            }
        }

        let paths: Vec<PathValue> = predictions.iter().map(|p| p.predicted.clone()).collect();
        match consensus_index(&paths) {
            Some(best) => Ok(predictions.swap_remove(best)),
            None => Err(first_error.unwrap_or(InferenceError::EmptyEnsemble)),
        }
    }
}
