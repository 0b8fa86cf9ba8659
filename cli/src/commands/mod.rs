//! CLI command implementations

pub mod check;
pub mod generate;
pub mod init;

use drizzle_liquibase::Config;
use std::path::Path;

use crate::error::CliError;

/// Load and validate the config file for `check` and `generate`
pub fn load_config(path: &Path) -> Result<Config, CliError> {
    Ok(Config::load_from(path)?)
}
