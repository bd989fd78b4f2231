//! On-disk schema for a saved store.
//!
//! Schema types are kept apart from the runtime types so the file format can
//! evolve on its own. Paths are stored in their dotted text form and
//! timestamps as RFC 3339 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::ExampleId;
use crate::repr::{NodeId, PathValue};

/// Tag written into every file.
pub const FORMAT_NAME: &str = "ultratree-store";

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Top-level file envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEnvelope {
    pub format: String,
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub store: StoreSchema,
}

/// The three tables of a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSchema {
    pub examples: Vec<ExampleSchema>,
    #[serde(default)]
    pub buckets: Vec<BucketSchema>,
    #[serde(default)]
    pub nodes: Vec<NodeSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleSchema {
    pub id: ExampleId,
    pub target: PathValue,
    pub context: Vec<PathValue>,
}

/// One row of the example-to-node mapping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BucketSchema {
    pub example: ExampleId,
    pub node: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafEstimateSchema {
    pub exemplar: PathValue,
    pub data_quantity: usize,
    pub loss: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSchema {
    pub context_k: usize,
    pub region: PathValue,
    pub inner: NodeId,
    pub outer: NodeId,
    pub populated_at: DateTime<Utc>,
}

/// A node. Analysis locks are runtime state and are not saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSchema {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<LeafEstimateSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitSchema>,
    pub created_at: DateTime<Utc>,
}
