//! Single-tree traversal.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, enabled, Level};

use crate::data::{describe_path, Decoder, NoDecoder};
use crate::repr::{Node, NodeId, PathValue, TreeSnapshot};
use crate::store::NodeStore;

use super::{InferenceError, PathPredictor, Prediction};

/// A frozen tree ready for prediction.
///
/// The tree is copied out of the store once; later training does not affect
/// an existing engine.
pub struct InferenceEngine {
    snapshot: TreeSnapshot,
    as_of: Option<DateTime<Utc>>,
    decoder: Option<Box<dyn Decoder + Send + Sync>>,
}

impl fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("nodes", &self.snapshot.len())
            .field("as_of", &self.as_of)
            .field("decoder", &self.decoder.is_some())
            .finish()
    }
}

impl InferenceEngine {
    pub fn from_snapshot(snapshot: TreeSnapshot) -> Self {
        Self {
            snapshot,
            as_of: None,
            decoder: None,
        }
    }

    /// Build from a node set, optionally as it looked at `as_of`.
    pub fn from_nodes(nodes: &[Node], as_of: Option<DateTime<Utc>>) -> Self {
        let snapshot = match as_of {
            Some(cutoff) => TreeSnapshot::as_of(nodes, cutoff),
            None => TreeSnapshot::from_nodes(nodes.iter().cloned()),
        };
        Self {
            snapshot,
            as_of,
            decoder: None,
        }
    }

    /// Load the store's node table, optionally as it looked at `as_of`.
    pub fn from_store<S: NodeStore + ?Sized>(
        store: &S,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Self, InferenceError> {
        let nodes = store.fetch_all_nodes()?;
        Ok(Self::from_nodes(&nodes, as_of))
    }

    /// Label paths in debug traces.
    pub fn with_decoder(mut self, decoder: impl Decoder + Send + Sync + 'static) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    #[inline]
    pub fn snapshot(&self) -> &TreeSnapshot {
        &self.snapshot
    }

    #[inline]
    pub fn as_of(&self) -> Option<DateTime<Utc>> {
        self.as_of
    }

    /// Number of nodes in the tree.
    #[inline]
    pub fn size(&self) -> usize {
        self.snapshot.len()
    }

    /// Walk from the root to a leaf.
    ///
    /// At each internal node the context value at the node's position goes
    /// inner if it lies inside the node's region, outer otherwise.
    pub fn infer(&self, context: &[PathValue]) -> Result<Prediction, InferenceError> {
        let trace = self.decoder.is_some() && enabled!(Level::DEBUG);
        let mut node = self.snapshot.root().ok_or(InferenceError::RootNotFound)?;
        let mut depth = 0;
        let mut inner_matches = 0;
        let mut visited: HashSet<NodeId> = HashSet::new();

        while let Some(split) = &node.split {
            if !visited.insert(node.id) {
                return Err(InferenceError::CycleDetected { node: node.id });
            }
            let value = split
                .context_k
                .checked_sub(1)
                .and_then(|i| context.get(i))
                .ok_or(InferenceError::ContextIndexOutOfRange {
                    node: node.id,
                    k: split.context_k,
                    len: context.len(),
                })?;
            let (child, inside) = split.route(value);
            if trace {
                self.trace_step(node, split.context_k, value, &split.region, inside);
            }
            node = self
                .snapshot
                .get(child)
                .ok_or(InferenceError::DanglingChildReference {
                    node: node.id,
                    child,
                })?;
            depth += 1;
            if inside {
                inner_matches += 1;
            }
        }

        let predicted = node
            .exemplar()
            .cloned()
            .ok_or(InferenceError::MalformedPrediction { node: node.id })?;
        Ok(Prediction {
            leaf: node.id,
            predicted,
            depth,
            inner_matches,
        })
    }

    /// [`infer`](Self::infer) over textual paths.
    pub fn infer_text(&self, context: &[&str]) -> Result<Prediction, InferenceError> {
        let context = context
            .iter()
            .map(|text| PathValue::parse(text))
            .collect::<Result<Vec<_>, _>>()?;
        self.infer(&context)
    }

    /// Human-readable chain of decisions leading to `leaf`.
    pub fn explain(&self, leaf: NodeId) -> String {
        self.snapshot.describe_ancestry(leaf, self.decoder())
    }

    fn decoder(&self) -> &dyn Decoder {
        match &self.decoder {
            Some(d) => d.as_ref(),
            None => &NoDecoder,
        }
    }

    fn trace_step(&self, node: &Node, k: usize, value: &PathValue, region: &PathValue, inside: bool) {
        let decoder = self.decoder();
        debug!(
            node = node.id,
            context_k = k,
            value = %describe_path(decoder, value),
            region = %describe_path(decoder, region),
            inside,
            "traversal step"
        );
    }
}

impl PathPredictor for InferenceEngine {
    fn predict(&self, context: &[PathValue]) -> Result<Prediction, InferenceError> {
        self.infer(context)
    }
}
