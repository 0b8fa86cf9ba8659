//! Configuration errors

use std::path::PathBuf;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid timestamp format '{format}': {reason}")]
    InvalidTimestampFormat { format: String, reason: String },

    #[error("'{0}' must not be empty")]
    EmptyField(&'static str),

    #[error(
        "unsupported master changelog '{}': expected a .xml or .json file",
        .0.display()
    )]
    UnsupportedMasterChangelog(PathBuf),
}
