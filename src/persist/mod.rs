//! Saving and loading a [`MemoryStore`] as versioned JSON.
//!
//! The file holds the example table, the bucket mapping and the node table,
//! so training can resume and old trees can be inspected after a restart.
//!
//! ```no_run
//! use ultratree::persist;
//! use ultratree::store::{MemoryStore, SystemClock};
//!
//! let store = MemoryStore::new();
//! persist::save(&store, "tree.json").unwrap();
//! let restored = persist::load("tree.json", SystemClock).unwrap();
//! ```

mod convert;
pub mod schema;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::data::TrainingExample;
use crate::repr::{Node, TreeSnapshot};
use crate::store::{Clock, MemoryStore, StoreError, TreeStore};

use schema::{StoreEnvelope, StoreSchema, FORMAT_NAME, SCHEMA_VERSION};

/// Errors from reading or writing a store file.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file was written by an incompatible schema.
    #[error("unsupported schema version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The file is JSON but not a saved store.
    #[error("unknown format tag {0:?}")]
    UnknownFormat(String),

    /// The contents parse but do not describe a valid tree.
    #[error("invalid stored data: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Serialize `store` to `writer`.
pub fn write_json<W: Write>(store: &MemoryStore, writer: W) -> Result<(), PersistError> {
    let (examples, buckets, nodes) = store.export();
    let envelope = StoreEnvelope {
        format: FORMAT_NAME.to_string(),
        version: SCHEMA_VERSION,
        saved_at: store.now(),
        store: StoreSchema {
            examples: examples.into_iter().map(Into::into).collect(),
            buckets: buckets.into_iter().map(Into::into).collect(),
            nodes: nodes.into_iter().map(Into::into).collect(),
        },
    };
    serde_json::to_writer_pretty(writer, &envelope)?;
    Ok(())
}

/// Deserialize a store from `reader`, running it on `clock`.
pub fn read_json<R: Read>(reader: R, clock: impl Clock + 'static) -> Result<MemoryStore, PersistError> {
    let envelope: StoreEnvelope = serde_json::from_reader(reader)?;
    if envelope.format != FORMAT_NAME {
        return Err(PersistError::UnknownFormat(envelope.format));
    }
    if envelope.version != SCHEMA_VERSION {
        return Err(PersistError::UnsupportedVersion {
            found: envelope.version,
            supported: SCHEMA_VERSION,
        });
    }

    let StoreSchema {
        examples,
        buckets,
        nodes,
    } = envelope.store;
    let examples: Vec<TrainingExample> = examples.into_iter().map(Into::into).collect();
    let nodes = nodes
        .into_iter()
        .map(Node::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    TreeSnapshot::from_nodes(nodes.iter().cloned())
        .validate()
        .map_err(|e| PersistError::Validation(e.to_string()))?;
    let buckets = buckets.into_iter().map(|b| (b.example, b.node)).collect();

    Ok(MemoryStore::from_parts(examples, buckets, nodes, clock)?)
}

/// Write `store` to `path`.
///
/// The file is written next to `path` first and renamed into place, so a
/// failed save leaves any previous file intact.
pub fn save(store: &MemoryStore, path: impl AsRef<Path>) -> Result<(), PersistError> {
    let path = path.as_ref();
    let staging = path.with_extension("partial");
    {
        let mut writer = BufWriter::new(File::create(&staging)?);
        write_json(store, &mut writer)?;
        writer.flush()?;
    }
    fs::rename(&staging, path)?;
    info!(path = %path.display(), "saved store");
    Ok(())
}

/// Read a store saved with [`save`].
pub fn load(path: impl AsRef<Path>, clock: impl Clock + 'static) -> Result<MemoryStore, PersistError> {
    let path = path.as_ref();
    let store = read_json(BufReader::new(File::open(path)?), clock)?;
    info!(path = %path.display(), "loaded store");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ManualClock, NodeStore, RowStore};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::Value;
    use std::io::Cursor;

    fn epoch() -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::with_clock(ManualClock::ticking(epoch(), Duration::seconds(1)));
        store
            .insert_examples([
                TrainingExample::parse(1, "1.2", &["3.1"]).unwrap(),
                TrainingExample::parse(2, "1.3", &["4"]).unwrap(),
            ])
            .unwrap();
        store.init_root().unwrap();
        store
    }

    fn to_value(store: &MemoryStore) -> Value {
        let mut buf = Vec::new();
        write_json(store, &mut buf).unwrap();
        serde_json::from_slice(&buf).unwrap()
    }

    fn read_value(v: &Value) -> Result<MemoryStore, PersistError> {
        let bytes = serde_json::to_vec(v).unwrap();
        read_json(Cursor::new(bytes), ManualClock::new(epoch()))
    }

    #[test]
    fn in_memory_round_trip() {
        let original = store();
        let restored = read_value(&to_value(&original)).unwrap();
        assert_eq!(restored.export(), original.export());
        assert_eq!(restored.bucketed_count().unwrap(), 2);
        assert_eq!(restored.node_count().unwrap(), 1);
    }

    #[test]
    fn paths_are_stored_as_text() {
        let v = to_value(&store());
        assert_eq!(v["format"], FORMAT_NAME);
        assert_eq!(v["store"]["examples"][0]["target"], "1.2");
        assert_eq!(v["store"]["examples"][0]["context"][0], "3.1");
    }

    #[test]
    fn rejects_other_versions_and_formats() {
        let mut v = to_value(&store());
        v["version"] = Value::from(99);
        assert!(matches!(
            read_value(&v),
            Err(PersistError::UnsupportedVersion { found: 99, .. })
        ));

        let mut v = to_value(&store());
        v["format"] = Value::from("something-else");
        assert!(matches!(read_value(&v), Err(PersistError::UnknownFormat(_))));
    }

    #[test]
    fn rejects_broken_trees() {
        let mut v = to_value(&store());
        v["store"]["nodes"][0]["id"] = Value::from(7);
        assert!(matches!(read_value(&v), Err(PersistError::Validation(_))));

        let mut v = to_value(&store());
        v["store"]["examples"][0]["target"] = Value::from("1..2");
        assert!(matches!(read_value(&v), Err(PersistError::Json(_))));

        let mut v = to_value(&store());
        v["store"]["buckets"][0]["example"] = Value::from(42);
        assert!(matches!(
            read_value(&v),
            Err(PersistError::Store(StoreError::ExampleNotFound(42)))
        ));
    }
}
