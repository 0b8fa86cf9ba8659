//! Snapshot loading errors

use crate::traits::{ObjectKind, QualifiedName};
use std::path::PathBuf;

/// Snapshot errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse snapshot {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_json::Error),

    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version '{0}'")]
    UnsupportedVersion(String),

    #[error("duplicate table '{0}' in snapshot")]
    DuplicateTable(QualifiedName),

    #[error("duplicate {} '{name}' on table '{table}'", .kind.label())]
    DuplicateMember {
        table: QualifiedName,
        kind: ObjectKind,
        name: String,
    },

    #[error("failed to read migration history from {}: {reason}", .path.display())]
    History { path: PathBuf, reason: String },

    #[error("empty identifier in snapshot: {0}")]
    EmptyIdentifier(String),
}
