//! Canonical tree representation.
//!
//! - [`PathValue`] and [`cost`]: hierarchical values and their dissimilarity
//! - [`Node`], [`LeafEstimate`], [`SplitRule`]: the unit of the tree
//! - [`TreeSnapshot`]: an immutable, optionally time-travelled view of a tree

pub mod node;
pub mod path;
pub mod snapshot;

pub use node::{LeafEstimate, Node, NodeId, SplitRule, ROOT_NODE_ID};
pub use path::{cost, PathParseError, PathValue};
pub use snapshot::{project_as_of, SnapshotValidationError, TreeSnapshot};
