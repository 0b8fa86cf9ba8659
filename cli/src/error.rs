//! Error types for the CLI

use std::path::PathBuf;
use thiserror::Error;

use drizzle_liquibase::ConfigError;

/// CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] drizzle_liquibase::Error),

    #[error("{} already exists. Delete it first to reinitialize.", .0.display())]
    AlreadyExists(PathBuf),

    #[error("I/O error on {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
}
