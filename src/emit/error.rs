//! Emission errors

use crate::sql::SqlError;
use std::path::PathBuf;

/// Errors raised while rendering or writing a migration
#[derive(Debug, thiserror::Error)]
pub enum EmissionError {
    #[error("refusing to emit a migration without changes")]
    EmptyChangeSet,

    #[error(transparent)]
    Statement(#[from] SqlError),

    #[error("text cannot be represented in XML: {0:?}")]
    InvalidXmlText(String),

    #[error("failed to serialize changelog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to serialize snapshot: {0}")]
    Snapshot(#[source] serde_json::Error),

    #[error("malformed master changelog {}: {reason}", .path.display())]
    MalformedMaster { path: PathBuf, reason: String },

    #[error("migration {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("master changelog already includes {0}")]
    AlreadyIncluded(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EmissionError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
