//! ultratree: ultrametric trees for hierarchical path prediction.
//!
//! An ultrametric tree predicts a target path (for example a WordNet synset
//! path such as `1.4.2`) from a window of preceding context paths. Each
//! internal node tests whether one context value lies inside a path region;
//! each leaf predicts an exemplar path chosen by Monte-Carlo search.
//!
//! # Key Types
//!
//! - [`PathValue`] / [`cost`] - paths and the `2^-common_prefix` cost
//! - [`MemoryStore`] - example rows, bucket mapping and versioned nodes
//! - [`TrainingScheduler`] / [`TrainingConfig`] - leaf-wise tree growth
//! - [`InferenceEngine`] / [`EnsemblePredictor`] - prediction
//!
//! # Training
//!
//! Load examples into a store, build a [`TrainingConfig`] with
//! `TrainingConfig::builder()`, then call [`TrainingScheduler::run`].
//! See the [`training`] module for details.
//!
//! # Inference
//!
//! Freeze the tree with [`InferenceEngine::from_store`], optionally as it
//! looked at an earlier timestamp. See the [`inference`] module.

pub mod data;
pub mod inference;
pub mod persist;
pub mod repr;
pub mod store;
pub mod testing;
pub mod training;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Core values
pub use repr::{cost, Node, NodeId, PathParseError, PathValue, TreeSnapshot};

// Data
pub use data::{Decoder, ExampleId, TrainingExample};

// Storage
pub use store::{MemoryStore, NodeStore, RowStore, StoreError, TreeStore};

// Training
pub use training::{StopConditions, TrainError, TrainingConfig, TrainingScheduler};

// Inference
pub use inference::{EnsemblePredictor, InferenceEngine, InferenceError, PathPredictor, Prediction};

// Shared utilities
pub use utils::Parallelism;
