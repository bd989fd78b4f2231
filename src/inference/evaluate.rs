//! Evaluation of a predictor over labelled examples.

use serde::Serialize;
use tracing::warn;

use crate::data::{ExampleId, TrainingExample};
use crate::repr::{cost, NodeId, PathValue};

use super::PathPredictor;

/// Outcome for one evaluated example.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub example: ExampleId,
    pub leaf: NodeId,
    pub predicted: PathValue,
    pub target: PathValue,
    /// `cost(predicted, target)`.
    pub loss: f64,
    pub depth: usize,
    pub inner_matches: usize,
}

impl EvaluationRecord {
    /// Whether the prediction is exactly the target.
    #[inline]
    pub fn is_correct(&self) -> bool {
        self.predicted == self.target
    }
}

/// Aggregate of an evaluation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Examples that produced a prediction.
    pub data_points: usize,
    /// Examples whose prediction failed.
    pub failures: usize,
    /// Sum of per-example losses.
    pub total_loss: f64,
    pub records: Vec<EvaluationRecord>,
}

impl EvaluationReport {
    fn mean_of(&self, f: impl Fn(&EvaluationRecord) -> f64) -> f64 {
        if self.data_points == 0 {
            return 0.0;
        }
        self.records.iter().map(f).sum::<f64>() / self.data_points as f64
    }

    pub fn mean_loss(&self) -> f64 {
        self.mean_of(|r| r.loss)
    }

    pub fn average_depth(&self) -> f64 {
        self.mean_of(|r| r.depth as f64)
    }

    pub fn average_inner_matches(&self) -> f64 {
        self.mean_of(|r| r.inner_matches as f64)
    }

    /// Fraction of exact predictions.
    pub fn accuracy(&self) -> f64 {
        self.mean_of(|r| if r.is_correct() { 1.0 } else { 0.0 })
    }
}

/// Predict every example (up to `limit`) and score it against its target.
///
/// Prediction failures are logged and counted, not propagated.
pub fn evaluate<P: PathPredictor + ?Sized>(
    predictor: &P,
    examples: &[TrainingExample],
    limit: Option<usize>,
) -> EvaluationReport {
    let take = limit.unwrap_or(examples.len());
    let mut report = EvaluationReport::default();
    for example in examples.iter().take(take) {
        match predictor.predict(&example.context) {
            Ok(prediction) => {
                let loss = cost(&prediction.predicted, &example.target);
                report.total_loss += loss;
                report.data_points += 1;
                report.records.push(EvaluationRecord {
                    example: example.id,
                    leaf: prediction.leaf,
                    predicted: prediction.predicted,
                    target: example.target.clone(),
                    loss,
                    depth: prediction.depth,
                    inner_matches: prediction.inner_matches,
                });
            }
            Err(error) => {
                warn!(example = example.id, %error, "prediction failed");
                report.failures += 1;
            }
        }
    }
    report
}
