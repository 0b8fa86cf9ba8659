//! Error types for the migration pipeline

use crate::change::Ambiguity;
use crate::config::ConfigError;
use crate::emit::EmissionError;
use crate::pipeline::Stage;
use crate::snapshot::SnapshotError;

/// Pipeline error. Any of these leaves the migration history untouched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("failed to load snapshot: {0}")]
    SnapshotLoad(#[from] SnapshotError),

    #[error("{} ambiguous change(s) need manual resolution:\n{}", .0.len(), list(.0))]
    DiffAmbiguity(Vec<Ambiguity>),

    #[error("failed to emit migration: {0}")]
    Emission(#[from] EmissionError),

    #[error("pipeline already ran (stage: {0})")]
    Finished(Stage),
}

fn list(ambiguities: &[Ambiguity]) -> String {
    ambiguities
        .iter()
        .map(|a| format!("  - {a}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
