//! Training examples: a target path and the window of context paths before it.

use serde::{Deserialize, Serialize};

use crate::repr::{PathParseError, PathValue};

/// Permanent id of a training example.
pub type ExampleId = u64;

/// One row of training (or validation) data.
///
/// Produced once by the data preparation step and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Stable, unique id.
    pub id: ExampleId,
    /// The value to predict.
    pub target: PathValue,
    /// Preceding values; position `k` (1-based) is `context[k - 1]`.
    pub context: Vec<PathValue>,
}

impl TrainingExample {
    pub fn new(id: ExampleId, target: PathValue, context: Vec<PathValue>) -> Self {
        Self { id, target, context }
    }

    /// Build an example from text paths.
    pub fn parse(id: ExampleId, target: &str, context: &[&str]) -> Result<Self, PathParseError> {
        let target = PathValue::parse(target)?;
        let context = context
            .iter()
            .map(|c| PathValue::parse(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { id, target, context })
    }

    /// Context value at 1-based position `k`.
    #[inline]
    pub fn context_at(&self, k: usize) -> Option<&PathValue> {
        k.checked_sub(1).and_then(|i| self.context.get(i))
    }

    /// Width of the context window.
    #[inline]
    pub fn context_len(&self) -> usize {
        self.context.len()
    }
}
