//! Storage error types.

use thiserror::Error;

use crate::data::ExampleId;
use crate::repr::NodeId;

/// Storage operation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No node with this id.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// No example with this id.
    #[error("example {0} not found")]
    ExampleNotFound(ExampleId),

    /// An example id was inserted twice.
    #[error("example {0} already exists")]
    DuplicateExample(ExampleId),

    /// The node already has children; a node is split at most once.
    #[error("node {0} already has children")]
    NodeAlreadySplit(NodeId),

    /// The tree has no root yet.
    #[error("tree has not been initialized")]
    NotInitialized,

    /// A context position outside the stored window was requested.
    #[error("context position {k} is out of range for example {example} (window of {width})")]
    ContextIndexOutOfRange {
        k: usize,
        example: ExampleId,
        width: usize,
    },

    /// The bucket mapping disagrees with the tree.
    #[error("consistency violation: {details}")]
    ConsistencyViolation { details: String },
}

impl StoreError {
    pub(crate) fn violation(details: impl Into<String>) -> Self {
        StoreError::ConsistencyViolation {
            details: details.into(),
        }
    }
}

/// Convenient Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_ids() {
        assert_eq!(StoreError::NodeNotFound(7).to_string(), "node 7 not found");
        let err = StoreError::ContextIndexOutOfRange {
            k: 5,
            example: 3,
            width: 4,
        };
        assert!(err.to_string().contains("position 5"));
        assert!(StoreError::violation("2 != 3").to_string().ends_with("2 != 3"));
    }
}
