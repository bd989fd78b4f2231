//! Conversion between runtime tables and schema types.

use crate::data::{ExampleId, TrainingExample};
use crate::repr::{LeafEstimate, Node, NodeId, SplitRule};

use super::schema::{BucketSchema, ExampleSchema, LeafEstimateSchema, NodeSchema, SplitSchema};
use super::PersistError;

// =============================================================================
// Examples
// =============================================================================

impl From<TrainingExample> for ExampleSchema {
    fn from(e: TrainingExample) -> Self {
        Self {
            id: e.id,
            target: e.target,
            context: e.context,
        }
    }
}

impl From<ExampleSchema> for TrainingExample {
    fn from(s: ExampleSchema) -> Self {
        TrainingExample::new(s.id, s.target, s.context)
    }
}

impl From<(ExampleId, NodeId)> for BucketSchema {
    fn from((example, node): (ExampleId, NodeId)) -> Self {
        Self { example, node }
    }
}

// =============================================================================
// Nodes
// =============================================================================

impl From<Node> for NodeSchema {
    fn from(node: Node) -> Self {
        Self {
            id: node.id,
            parent: node.parent,
            estimate: node.estimate.map(|e| LeafEstimateSchema {
                exemplar: e.exemplar,
                data_quantity: e.data_quantity,
                loss: e.loss,
            }),
            split: node.split.map(|s| SplitSchema {
                context_k: s.context_k,
                region: s.region,
                inner: s.inner,
                outer: s.outer,
                populated_at: s.populated_at,
            }),
            created_at: node.created_at,
        }
    }
}

impl TryFrom<NodeSchema> for Node {
    type Error = PersistError;

    fn try_from(s: NodeSchema) -> Result<Self, Self::Error> {
        if let Some(e) = &s.estimate {
            if !e.loss.is_finite() || e.loss < 0.0 {
                return Err(PersistError::Validation(format!(
                    "node {} has invalid loss {}",
                    s.id, e.loss
                )));
            }
        }
        let split = match s.split {
            Some(split) => {
                if split.context_k == 0 {
                    return Err(PersistError::Validation(format!(
                        "node {} tests context position 0",
                        s.id
                    )));
                }
                if split.inner == split.outer {
                    return Err(PersistError::Validation(format!(
                        "node {} has identical children",
                        s.id
                    )));
                }
                Some(SplitRule {
                    context_k: split.context_k,
                    region: split.region,
                    inner: split.inner,
                    outer: split.outer,
                    populated_at: split.populated_at,
                })
            }
            None => None,
        };
        let mut node = Node::leaf(
            s.id,
            s.parent,
            s.estimate.map(|e| LeafEstimate {
                exemplar: e.exemplar,
                data_quantity: e.data_quantity,
                loss: e.loss,
            }),
            s.created_at,
        );
        node.split = split;
        Ok(node)
    }
}
