//! Snapshot loaders
//!
//! Turning schema source into a snapshot is the job of an external
//! introspection tool. This module is the seam it plugs into, plus the JSON
//! loader used for exported snapshots and for the snapshots persisted next to
//! the migrations.

use super::{SchemaSnapshot, SnapshotError};
use std::path::{Path, PathBuf};

/// Produces a schema snapshot on demand
pub trait SnapshotLoader {
    fn load(&self) -> Result<SchemaSnapshot, SnapshotError>;
}

impl SnapshotLoader for SchemaSnapshot {
    fn load(&self) -> Result<SchemaSnapshot, SnapshotError> {
        Ok(self.clone())
    }
}

impl<F> SnapshotLoader for F
where
    F: Fn() -> Result<SchemaSnapshot, SnapshotError>,
{
    fn load(&self) -> Result<SchemaSnapshot, SnapshotError> {
        self()
    }
}

/// Loads a snapshot from a JSON file
#[derive(Debug, Clone)]
pub struct JsonSnapshotLoader {
    path: PathBuf,
}

impl JsonSnapshotLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotLoader for JsonSnapshotLoader {
    fn load(&self) -> Result<SchemaSnapshot, SnapshotError> {
        let snapshot = SchemaSnapshot::load(&self.path)?;
        tracing::debug!(
            path = %self.path.display(),
            tables = snapshot.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }
}
